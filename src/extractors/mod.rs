//! Request extractors.

mod bearer;

pub use bearer::{BearerToken, AUTHORIZATION_HEADER};
