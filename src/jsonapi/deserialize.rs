//! JSON-API document -> flat rows ready for the write path.

use crate::case::to_camel_case;
use crate::config::{ColumnType, Schema};
use crate::error::AppError;
use crate::model::{cast_value, Row};
use serde_json::{Map, Value};

/// Rows decoded from a request body; `many` when `data` was an array.
#[derive(Debug, Clone, PartialEq)]
pub struct Incoming {
    pub rows: Vec<Row>,
    pub many: bool,
}

impl Incoming {
    pub fn into_one(self) -> Result<Row, AppError> {
        if self.many {
            return Err(AppError::Validation("expected a single resource in `data`".into()));
        }
        self.rows
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Validation("`data` holds no resource".into()))
    }
}

pub fn deserialize(schema: &Schema, document: &Value) -> Result<Incoming, AppError> {
    let data = document
        .get("data")
        .ok_or_else(|| AppError::Validation("document has no `data` member".into()))?;
    match data {
        Value::Object(resource) => Ok(Incoming {
            rows: vec![resource_to_row(schema, resource)?],
            many: false,
        }),
        Value::Array(items) => {
            let rows = items
                .iter()
                .map(|item| {
                    item.as_object()
                        .ok_or_else(|| AppError::Validation("each resource in `data` must be an object".into()))
                        .and_then(|resource| resource_to_row(schema, resource))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Incoming { rows, many: true })
        }
        _ => Err(AppError::Validation("`data` must be an object or an array".into())),
    }
}

/// Identifiers travel as strings; bring them back to the schema's id representation.
fn cast_key(v: &Value) -> Value {
    match v {
        Value::String(s) => cast_value(ColumnType::Id, Some(s)),
        other => other.clone(),
    }
}

fn resource_to_row(schema: &Schema, resource: &Map<String, Value>) -> Result<Row, AppError> {
    let kind = resource
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Validation("resource is missing `type`".into()))?;
    if kind != schema.resource_type {
        return Err(AppError::Validation(format!(
            "resource type '{}' does not match '{}'",
            kind, schema.resource_type
        )));
    }

    let mut row = Row::new();
    if let Some(id) = resource.get("id").filter(|v| !v.is_null()) {
        row.insert(schema.id_field().to_string(), cast_key(id));
    }

    match resource.get("attributes") {
        None | Some(Value::Null) => {}
        Some(Value::Object(attributes)) => {
            for (key, value) in attributes {
                row.insert(to_camel_case(key), value.clone());
            }
        }
        Some(_) => return Err(AppError::Validation("`attributes` must be an object".into())),
    }

    match resource.get("relationships") {
        None | Some(Value::Null) => {}
        Some(Value::Object(relationships)) => {
            for (name, relationship) in relationships {
                let field = to_camel_case(name);
                // hasMany linkage is owned by the children
                if schema.has_many_named(&field).is_some() {
                    continue;
                }
                let fk_as = schema
                    .belongs_to_named(&field)
                    .map(|b| b.fk_as.clone())
                    .unwrap_or_else(|| format!("{}Id", field));
                let key = match relationship.get("data") {
                    Some(Value::Null) => Value::Null,
                    Some(Value::Object(linkage)) => linkage.get("id").map(cast_key).ok_or_else(|| {
                        AppError::Validation(format!("relationship '{}' references no id", name))
                    })?,
                    _ => {
                        return Err(AppError::Validation(format!(
                            "relationship '{}' must reference a single resource",
                            name
                        )))
                    }
                };
                row.insert(fk_as, key);
            }
        }
        Some(_) => return Err(AppError::Validation("`relationships` must be an object".into())),
    }
    Ok(row)
}
