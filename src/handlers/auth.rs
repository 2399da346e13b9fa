//! `POST /auth`: exchange login and password for a bearer token.

use crate::auth::{authenticate, TOKEN_TTL_HOURS};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TokenBody {
    pub token: String,
    #[serde(rename = "expiresIn")]
    pub expires_in: i64,
}

pub async fn login(
    State(state): State<AppState>,
    credentials: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<TokenBody>, AppError> {
    let Json(credentials) = credentials?;
    let account = authenticate(
        &state.registry,
        &state.settings.auth_model,
        &credentials.login,
        &credentials.password,
    )
    .await?;
    let token = state.auth.issue(&account.id, &account.name)?;
    tracing::info!(account = %account.id, "token issued");
    Ok(Json(TokenBody {
        token,
        expires_in: TOKEN_TTL_HOURS * 3600,
    }))
}
