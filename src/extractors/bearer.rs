//! Extract the raw `Authorization` header value.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Raw `Authorization` header, `None` when absent or blank. Scheme parsing is left to `JwtAuth`.
#[derive(Clone, Debug)]
pub struct BearerToken(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(AUTHORIZATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(BearerToken(value))
    }
}
