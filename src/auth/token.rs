//! HS256 access tokens

use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const MIN_SECRET_KEY_SIZE: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token is invalid")]
    Invalid,

    #[error("invalid key size: must be at least {MIN_SECRET_KEY_SIZE} characters")]
    KeySize,
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub jti: Uuid,
    /// Username
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct JwtMaker {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtMaker {
    pub fn new(secret_key: &str) -> Result<Self, TokenError> {
        if secret_key.len() < MIN_SECRET_KEY_SIZE {
            return Err(TokenError::KeySize);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret_key.as_bytes()),
        })
    }

    pub fn create_token(
        &self,
        username: &str,
        role: &str,
        duration: Duration,
    ) -> Result<(String, Payload), TokenError> {
        let now = Utc::now();
        let payload = Payload {
            jti: Uuid::new_v4(),
            sub: username.to_string(),
            role: role.to_string(),
            iat: now.timestamp(),
            exp: (now + duration).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)
            .map_err(|_| TokenError::Invalid)?;
        Ok((token, payload))
    }

    pub fn verify_token(&self, token: &str) -> Result<Payload, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        match decode::<Payload>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => Err(TokenError::Expired),
            Err(_) => Err(TokenError::Invalid),
        }
    }
}
