//! Typed errors and HTTP mapping (JSON-API error documents).

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config load: {0}")]
    Load(String),
    #[error("model '{0}' is already registered")]
    DuplicateModel(String),
    #[error("invalid setting {name}: {reason}")]
    Setting { name: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("model for relation '{0}' is not registered")]
    MissingModel(String),
    #[error("no belongsTo on '{related}' links back to '{model}'")]
    ReverseLinkNotFound { model: String, related: String },
    #[error("database: {0}")]
    Db(String),
    #[error("there is no record with id: '{id}' in '{kind}' type")]
    RelatedRecordNotFound { id: String, kind: String },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::RelatedRecordNotFound { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Config(_)
            | AppError::MissingModel(_)
            | AppError::ReverseLinkNotFound { .. }
            | AppError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::MissingModel(_) => "missing_model",
            AppError::ReverseLinkNotFound { .. } => "reverse_link_not_found",
            AppError::Db(_) => "database_error",
            AppError::RelatedRecordNotFound { .. } => "related_record_not_found",
            AppError::Unauthorized(_) => "unauthorized",
        }
    }

    /// JSON-API error document for this error.
    pub fn to_body(&self, expose_stack: bool) -> ErrorBody {
        ErrorBody {
            errors: vec![ErrorDetail {
                status: self.status().as_u16().to_string(),
                code: self.code().to_string(),
                message: self.to_string(),
                stack: expose_stack.then(|| format!("{:?}", self)),
            }],
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("invalid request body: {}", rejection.body_text()))
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct ErrorBody {
    pub errors: Vec<ErrorDetail>,
}

#[derive(Serialize, Clone, Debug)]
pub struct ErrorDetail {
    pub status: String,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let mut res = (status, Json(self.to_body(false))).into_response();
        res.extensions_mut().insert(DetailedErrorBody(self.to_body(true)));
        res
    }
}

/// The error body with `stack` filled in, carried on every error response.
#[derive(Clone)]
struct DetailedErrorBody(ErrorBody);

/// Development-mode response mapper: error responses get the body carrying `stack`.
pub async fn attach_error_stack(mut res: Response) -> Response {
    let detailed = res.extensions_mut().remove::<DetailedErrorBody>();
    match detailed {
        Some(DetailedErrorBody(body)) => (res.status(), Json(body)).into_response(),
        None => res,
    }
}
