//! Resource routes. The first segment is the JSON-API type (`users`, `user-groups`, ...);
//! handlers resolve the model through the registry.

use crate::handlers::entity::{create, delete as delete_handler, list, read, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/:resource", get(list).post(create))
        .route("/:resource/:id", get(read).patch(update).delete(delete_handler))
        .with_state(state)
}
