use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::state::AppState;
use super::types::{ApiError, error_codes};
use crate::store::Store;

const BEARER: &str = "Bearer ";

/// Verify the bearer token and inject its [`Payload`](crate::auth::Payload).
pub async fn jwt_auth_middleware<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            ApiError::new(
                axum::http::StatusCode::UNAUTHORIZED,
                error_codes::MISSING_AUTH,
                "Missing Authorization header",
            )
        })?;

    let token = auth_header
        .strip_prefix(BEARER)
        .ok_or_else(|| ApiError::unauthorized("Invalid token format"))?;

    let payload = state.token_maker.verify_token(token)?;
    request.extensions_mut().insert(payload);
    Ok(next.run(request).await)
}
