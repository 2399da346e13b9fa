//! Resource handlers: list, find, create (one or many), update, delete.

use crate::error::AppError;
use crate::handlers::query::{parse_fetch_options, parse_id};
use crate::model::Model;
use crate::response::{document_created, document_ok};
use crate::service::ApiService;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::sync::Arc;

fn model_for(state: &AppState, resource: &str) -> Result<Arc<Model>, AppError> {
    state
        .registry
        .by_resource_type(resource)
        .ok_or_else(|| AppError::NotFound(format!("resource type '{}'", resource)))
}

pub async fn list(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let model = model_for(&state, &resource)?;
    let opts = parse_fetch_options(model.schema(), &params)?;
    let doc = ApiService::api_fetch_all(&state.registry, &model, &opts).await?;
    Ok(document_ok(doc))
}

pub async fn read(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let model = model_for(&state, &resource)?;
    let opts = parse_fetch_options(model.schema(), &params)?;
    let id = parse_id(model.schema(), &id);
    let doc = ApiService::api_find(&state.registry, &model, &id, &opts.serialize).await?;
    Ok(document_ok(doc))
}

pub async fn create(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = body?;
    let model = model_for(&state, &resource)?;
    let doc = ApiService::api_create(&state.registry, &model, &body).await?;
    Ok(document_created(doc))
}

pub async fn update(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = body?;
    let model = model_for(&state, &resource)?;
    let id = parse_id(model.schema(), &id);
    let doc = ApiService::api_update(&state.registry, &model, &id, &body).await?;
    Ok(document_ok(doc))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let model = model_for(&state, &resource)?;
    let id = parse_id(model.schema(), &id);
    ApiService::api_delete(&state.registry, &model, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
