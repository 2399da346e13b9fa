//! Raw schema types as written in resource files (`resources/*.json`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// One model definition before descriptor resolution.
///
/// `fields` is kept as a raw JSON object so field declaration order survives and
/// each entry can be inspected for its descriptor shape:
///
/// ```json
/// {
///   "name": "user",
///   "tableName": "Users",
///   "fields": {
///     "id": { "type": "id", "column": "UserID" },
///     "name": "string",
///     "group": { "belongsTo": "userGroup", "fkField": "GrpID" }
///   }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSchema {
    pub name: String,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// Field names never exposed in API responses (e.g. password hashes).
    #[serde(default)]
    pub sensitive: Vec<String>,
    /// Collection listing readable without a token.
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}
