//! Common routes: health and version.

use axum::{routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    time: String,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        time: Utc::now().to_rfc3339(),
    })
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /health, GET /version. No state.
pub fn common_routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
}
