//! Password hashing (argon2) and bearer access tokens (HS256 JWT).

pub mod password;
pub mod token;

pub use password::{PasswordError, check_password, hash_password};
pub use token::{JwtMaker, Payload, TokenError};
