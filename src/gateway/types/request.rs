//! Request DTOs checked with `validator` before reaching the services.

use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::ledger::Page;
use crate::store::is_supported_currency;

fn validate_currency(value: &str) -> Result<(), ValidationError> {
    if is_supported_currency(value) {
        Ok(())
    } else {
        Err(ValidationError::new("currency").with_message("unsupported currency".into()))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginUserRequest {
    #[validate(length(min = 3, max = 100))]
    pub username: String,
    #[validate(length(min = 6, max = 100))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyEmailQuery {
    #[validate(range(min = 1))]
    pub email_id: i64,
    #[validate(length(equal = 32))]
    pub secret_code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccountRequest {
    #[validate(custom(function = "validate_currency"))]
    pub currency: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransferRequest {
    #[validate(range(min = 1))]
    pub from_account_id: i64,
    #[validate(range(min = 1))]
    pub to_account_id: i64,
    #[validate(range(min = 1))]
    pub amount: i64,
    #[validate(custom(function = "validate_currency"))]
    pub currency: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PageQuery {
    #[validate(range(min = 1))]
    pub page_id: i32,
    #[validate(range(min = 3, max = 10))]
    pub page_size: i32,
}

impl From<&PageQuery> for Page {
    fn from(q: &PageQuery) -> Self {
        Page {
            page_id: q.page_id,
            page_size: q.page_size,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AccountPageQuery {
    #[validate(range(min = 1))]
    pub account_id: i64,
    #[validate(range(min = 1))]
    pub page_id: i32,
    #[validate(range(min = 3, max = 10))]
    pub page_size: i32,
}

impl From<&AccountPageQuery> for Page {
    fn from(q: &AccountPageQuery) -> Self {
        Page {
            page_id: q.page_id,
            page_size: q.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_request_validation() {
        let ok = CreateTransferRequest {
            from_account_id: 1,
            to_account_id: 2,
            amount: 10,
            currency: "USD".into(),
        };
        assert!(ok.validate().is_ok());

        let bad = CreateTransferRequest {
            amount: 0,
            currency: "XYZ".into(),
            ..ok
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("amount"));
        assert!(fields.contains_key("currency"));
    }

    #[test]
    fn test_page_query_bounds() {
        assert!(PageQuery { page_id: 1, page_size: 5 }.validate().is_ok());
        assert!(PageQuery { page_id: 0, page_size: 5 }.validate().is_err());
        assert!(PageQuery { page_id: 1, page_size: 20 }.validate().is_err());
    }
}
