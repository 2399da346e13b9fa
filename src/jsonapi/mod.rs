//! JSON-API document shapes and the row <-> document conversions.

mod deserialize;
mod serialize;

pub use deserialize::{deserialize, Incoming};
pub use serialize::{SerializeOptions, Serializer};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level document: primary data, optional `included` and list `meta`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    pub data: PrimaryData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum PrimaryData {
    Many(Vec<Resource>),
    One(Box<Resource>),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub relationships: Map<String, Value>,
}

/// `status` is `"ok"` when the listing has rows, `"empty"` otherwise.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    pub count: usize,
    pub status: String,
}

impl Meta {
    pub fn for_count(count: usize) -> Self {
        Meta {
            count,
            status: if count == 0 { "empty" } else { "ok" }.to_string(),
        }
    }
}

impl Document {
    pub fn one(resource: Resource, included: Vec<Resource>) -> Self {
        Document {
            data: PrimaryData::One(Box::new(resource)),
            included,
            meta: None,
        }
    }

    pub fn many(resources: Vec<Resource>, included: Vec<Resource>) -> Self {
        let meta = Meta::for_count(resources.len());
        Document {
            data: PrimaryData::Many(resources),
            included,
            meta: Some(meta),
        }
    }
}
