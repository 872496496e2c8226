//! Gateway types module
//!
//! - [`request`]: validated request DTOs
//! - [`response`]: response envelope, handler error type, error codes

pub mod request;
pub mod response;

pub use request::{
    AccountPageQuery, CreateAccountRequest, CreateTransferRequest, LoginUserRequest, PageQuery,
    VerifyEmailQuery,
};
pub use response::{ApiError, ApiResponse, ApiResult, created, error_codes, ok};

/// Run `validator` checks, mapping failures to a 400 response.
pub fn validated<T: validator::Validate>(req: T) -> Result<T, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(req)
}
