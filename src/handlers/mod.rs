//! HTTP handlers for resources and token issuance.

pub mod auth;
pub mod entity;
pub mod query;
pub use entity::*;
