//! Token issuance route.

use crate::handlers::auth::login;
use crate::state::AppState;
use axum::{routing::post, Router};

pub fn auth_routes(state: AppState) -> Router {
    Router::new().route("/auth", post(login)).with_state(state)
}
