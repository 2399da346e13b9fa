//! SQL builder: identifiers from schema files only, values as bound parameters.

mod builder;
mod filter;
pub use builder::*;
pub use filter::*;
