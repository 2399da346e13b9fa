//! Request-level services: relation resolution, validation and the API wrapper.

mod api;
mod relations;
mod validation;

pub use api::{ApiService, FetchOptions};
pub use relations::{embed_belongs_to, embed_has_many, BelongsToData, HasManyData, RelationResolver};
pub use validation::RequestValidator;
