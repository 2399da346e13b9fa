//! Raw driver text -> typed JSON values, per schema column type.

use crate::config::{ColumnType, Schema};
use crate::db::RawRow;
use crate::model::Row;
use serde_json::Value;

const TRUTHY: &[&str] = &["1", "true", "t", "y", "yes", "on"];
const FALSY: &[&str] = &["0", "false", "f", "n", "no", "off", ""];

pub fn cast_value(ty: ColumnType, raw: Option<&str>) -> Value {
    let Some(s) = raw else {
        return Value::Null;
    };
    match ty {
        ColumnType::String => Value::String(s.to_string()),
        ColumnType::Integer | ColumnType::Id => match s.trim().parse::<i64>() {
            Ok(n) => Value::Number(n.into()),
            Err(_) => {
                if ty == ColumnType::Integer {
                    tracing::warn!(value = %s, "non-integer value in integer column");
                }
                Value::String(s.to_string())
            }
        },
        ColumnType::Boolean => {
            let lower = s.trim().to_ascii_lowercase();
            if TRUTHY.contains(&lower.as_str()) {
                Value::Bool(true)
            } else if FALSY.contains(&lower.as_str()) {
                Value::Bool(false)
            } else {
                tracing::warn!(value = %s, "non-boolean value in boolean column");
                Value::String(s.to_string())
            }
        }
    }
}

/// Cast a whole row. Aliases the schema does not know are kept as strings.
pub fn cast_row(schema: &Schema, raw: &RawRow) -> Row {
    raw.iter()
        .map(|(alias, v)| {
            let ty = schema.type_of(alias).unwrap_or(ColumnType::String);
            (alias.to_string(), cast_value(ty, v))
        })
        .collect()
}

/// Key comparison tolerant of `1` vs `"1"`.
pub fn ids_equal(a: &Value, b: &Value) -> bool {
    match (id_text(a), id_text(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Text form of an identifier value; `None` for null and structured values.
pub fn id_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
