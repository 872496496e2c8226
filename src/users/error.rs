use thiserror::Error;

use crate::auth::{PasswordError, TokenError};
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum UserError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("user already exists: {0}")]
    AlreadyExists(String),

    #[error("not found")]
    NotFound,

    #[error("incorrect username or password")]
    InvalidCredentials,

    #[error("password error: {0}")]
    Password(PasswordError),

    #[error("token error: {0}")]
    Token(#[from] TokenError),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for UserError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => UserError::NotFound,
            StoreError::UniqueViolation(msg) => UserError::AlreadyExists(msg),
            other => UserError::Store(other),
        }
    }
}

impl From<PasswordError> for UserError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::Mismatch => UserError::InvalidCredentials,
            other => UserError::Password(other),
        }
    }
}

impl UserError {
    pub fn code(&self) -> &'static str {
        match self {
            UserError::Validation(_) => "INVALID_REQUEST",
            UserError::AlreadyExists(_) => "USER_EXISTS",
            UserError::NotFound => "NOT_FOUND",
            UserError::InvalidCredentials => "INVALID_CREDENTIALS",
            UserError::Password(_) => "PASSWORD_ERROR",
            UserError::Token(_) => "TOKEN_ERROR",
            UserError::Store(e) => e.code(),
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            UserError::Validation(_) => 400,
            UserError::AlreadyExists(_) => 403,
            UserError::NotFound => 404,
            UserError::InvalidCredentials => 401,
            UserError::Password(_) | UserError::Token(_) | UserError::Store(_) => 500,
        }
    }
}
