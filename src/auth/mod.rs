//! Token auth: credential check against the accounts model, JWT issuance, and the request gate.

mod jwt;

pub use jwt::{Claims, JwtAuth, JwtError, TOKEN_TTL_HOURS};

use crate::error::AppError;
use crate::extractors::BearerToken;
use crate::model::{id_text, ModelRegistry};
use crate::sql::{Filter, SelectOptions};
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use serde_json::Value;

/// Account identity resolved from `login` / `password`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub name: String,
}

/// Look up `login` on the accounts model and compare the stored password.
pub async fn authenticate(
    registry: &ModelRegistry,
    auth_model: &str,
    login: &str,
    password: &str,
) -> Result<Account, AppError> {
    let model = registry
        .get(auth_model)
        .ok_or_else(|| AppError::MissingModel(auth_model.to_string()))?;
    let schema = model.schema();
    schema.require_column("login")?;
    schema.require_column("password")?;

    let opts = SelectOptions {
        filter: Filter::new().eq("login", login),
        limit: Some(1),
        ..Default::default()
    };
    let rejected = || AppError::Unauthorized("invalid login or password".into());
    let row = model.select_many(&opts).await?.into_iter().next().ok_or_else(rejected)?;
    if row.get("password").and_then(Value::as_str) != Some(password) {
        tracing::warn!(login = %login, "rejected credentials");
        return Err(rejected());
    }
    let id = row.get(schema.id_field()).and_then(id_text).ok_or_else(rejected)?;
    Ok(Account {
        id,
        name: login.to_string(),
    })
}

/// Routes reachable without a token: auth, health/version, and GET listings of public resources.
pub fn is_exempt(registry: &ModelRegistry, method: &Method, path: &str) -> bool {
    let segments: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        ["auth"] => true,
        ["health"] | ["version"] => *method == Method::GET,
        [resource] if *method == Method::GET => registry.by_resource_type(resource).is_some_and(|m| m.schema().public),
        _ => false,
    }
}

/// Middleware: validate the bearer token and attach its claims to the request.
pub async fn require_token(
    State(state): State<AppState>,
    BearerToken(header): BearerToken,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if is_exempt(&state.registry, req.method(), req.uri().path()) {
        return Ok(next.run(req).await);
    }
    let header = header.ok_or(JwtError::MissingToken)?;
    let token = JwtAuth::extract_token(&header)?;
    let claims = state.auth.validate_token(token).map_err(|e| {
        tracing::warn!(error = %e, path = %req.uri().path(), "rejected token");
        e
    })?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
