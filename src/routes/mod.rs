//! Router assembly: common, auth and resource routes behind the token gate.

mod auth;
mod common;
mod entity;

pub use auth::auth_routes;
pub use common::common_routes;
pub use entity::entity_routes;

use crate::auth::require_token;
use crate::error::attach_error_stack;
use crate::state::AppState;
use axum::{middleware, Router};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub fn app(state: AppState) -> Router {
    let max_body_bytes = state.settings.max_body_bytes;
    let development = state.settings.development;
    let router = Router::new()
        .merge(common_routes())
        .merge(auth_routes(state.clone()))
        .merge(entity_routes(state.clone()))
        .layer(middleware::from_fn_with_state(state, require_token));
    let router = if development {
        router.layer(middleware::map_response(attach_error_stack))
    } else {
        router
    };
    router
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
}
