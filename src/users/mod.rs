//! User registration, login and email verification

pub mod error;
pub mod service;

pub use error::UserError;
pub use service::{
    CreateUserRequest, LoginResult, UserService, VerifyEmailResult, random_secret_code,
};
