//! HS256 token issuance and validation with the jsonwebtoken crate.

use crate::error::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tokens expire twelve hours after issuance.
pub const TOKEN_TTL_HOURS: i64 = 12;

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid token format (expected 'Bearer <token>')")]
    InvalidFormat,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token has expired")]
    Expired,
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<JwtError> for AppError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::Signing(msg) => AppError::Config(crate::error::ConfigError::Setting {
                name: "JWT_SECRET",
                reason: msg,
            }),
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Account identifier.
    pub id: String,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct JwtAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtAuth {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 60;
        JwtAuth {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue(&self, id: &str, name: &str) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            id: id.to_string(),
            name: name.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| JwtError::Signing(e.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::Invalid(e.to_string()),
        })?;
        if data.claims.id.is_empty() {
            return Err(JwtError::Invalid("missing claim: id".into()));
        }
        Ok(data.claims)
    }

    /// Token part of an `Authorization: Bearer <token>` value.
    pub fn extract_token(auth_header: &str) -> Result<&str, JwtError> {
        let token = auth_header.strip_prefix("Bearer ").ok_or(JwtError::InvalidFormat)?.trim();
        if token.is_empty() {
            return Err(JwtError::MissingToken);
        }
        Ok(token)
    }
}
