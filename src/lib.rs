//! JSON-API gateway: schema-driven CRUD over a legacy SQL database with relation embedding.

pub mod auth;
pub mod case;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod jsonapi;
pub mod model;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;

#[cfg(test)]
mod testing;

pub use config::{load_schemas_from_dir, resolve_schema, RawSchema, Schema};
pub use db::{Database, PgDatabase};
pub use error::{AppError, ConfigError};
pub use jsonapi::{Document, SerializeOptions};
pub use model::{Model, ModelRegistry};
pub use routes::app;
pub use service::{ApiService, FetchOptions, RelationResolver};
pub use settings::Settings;
pub use state::AppState;
