//! Query-string parsing for list and find: `related`, `fields`, `filter`, `order`, `limit`, `offset`.

use crate::case::to_camel_case;
use crate::config::{ColumnType, Schema};
use crate::error::AppError;
use crate::jsonapi::SerializeOptions;
use crate::model::cast_value;
use crate::service::FetchOptions;
use crate::sql::{parse_order, Filter, OrderBy};
use serde_json::{Map, Value};

fn truthy(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// `filter[name]` -> `name`.
fn bracketed<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)?.strip_prefix('[')?.strip_suffix(']')
}

/// Query values are text; give them the field's type so literals compare like stored values.
fn typed(schema: &Schema, field: &str, raw: &str) -> Value {
    match schema.type_of(field) {
        Some(ty) => cast_value(ty, Some(raw)),
        None => cast_value(ColumnType::String, Some(raw)),
    }
}

fn push_filter(filter: &mut Map<String, Value>, field: String, value: Value) {
    match filter.get_mut(&field) {
        Some(Value::Array(values)) => values.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            filter.insert(field, value);
        }
    }
}

pub fn parse_fetch_options(schema: &Schema, params: &[(String, String)]) -> Result<FetchOptions, AppError> {
    let mut opts = FetchOptions::default();
    let mut fields: Vec<String> = Vec::new();
    let mut filter = Map::new();
    let mut order_by: Vec<OrderBy> = Vec::new();

    for (key, value) in params {
        match key.as_str() {
            "related" => opts.serialize.with_related = truthy(value),
            "fields" | "fields[]" => fields.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(to_camel_case),
            ),
            "filter" => {
                let parsed: Value = serde_json::from_str(value)
                    .map_err(|e| AppError::Validation(format!("filter must be a JSON object: {}", e)))?;
                let Value::Object(obj) = parsed else {
                    return Err(AppError::Validation("filter must be a JSON object".into()));
                };
                for (field, v) in obj {
                    push_filter(&mut filter, to_camel_case(&field), v);
                }
            }
            "order" => order_by.extend(parse_order(value).into_iter().map(|o| OrderBy {
                field: to_camel_case(&o.field),
                ..o
            })),
            "limit" => opts.select.limit = value.parse().ok(),
            "offset" => opts.select.offset = value.parse().ok(),
            other => {
                if let Some(field) = bracketed(other, "filter") {
                    let field = to_camel_case(field);
                    let v = typed(schema, &field, value);
                    push_filter(&mut filter, field, v);
                } else {
                    tracing::debug!(param = %other, "ignoring query parameter");
                }
            }
        }
    }

    opts.select.filter = Filter::from(filter);
    opts.select.order_by = order_by;
    opts.serialize = SerializeOptions {
        fields_only: (!fields.is_empty()).then_some(fields),
        with_related: opts.serialize.with_related,
    };
    Ok(opts)
}

/// Path identifier typed like the schema's id column.
pub fn parse_id(schema: &Schema, raw: &str) -> Value {
    cast_value(schema.id.ty, Some(raw))
}
