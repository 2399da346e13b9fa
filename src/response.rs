//! JSON-API response helpers.

use crate::jsonapi::Document;
use axum::{http::StatusCode, Json};

pub fn document_ok(doc: Document) -> (StatusCode, Json<Document>) {
    (StatusCode::OK, Json(doc))
}

pub fn document_created(doc: Document) -> (StatusCode, Json<Document>) {
    (StatusCode::CREATED, Json(doc))
}
