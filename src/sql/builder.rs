//! Builds SELECT, INSERT, UPDATE, DELETE statements from a resolved schema.
//! Identifiers come from schema files only; values travel as `$n` parameters.
//! Every selected column is cast to text so the executor hands back strings.

use crate::config::{ColumnType, Schema};
use crate::error::AppError;
use crate::model::{cast_value, id_text, Row};
use crate::sql::{Filter, OrderBy};
use serde_json::Value;
use std::collections::HashSet;

const MAX_LIMIT: u32 = 1000;

/// Prefix of the alias under which a raw relation key is selected for matching.
const KEY_ALIAS_PREFIX: &str = "__fk_";

#[derive(Clone, Debug, Default)]
pub struct SelectOptions {
    pub filter: Filter,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// SQL text plus positional parameters, in placeholder order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    /// Placeholder for `value`. NULL is written inline so it never needs a bound type.
    fn bind(&mut self, value: Value) -> String {
        if value.is_null() {
            return "NULL".to_string();
        }
        self.params.push(value);
        format!("${}", self.params.len())
    }

    /// Bind a field value typed like the schema declares it.
    fn bind_field(&mut self, schema: &Schema, field: &str, value: &Value) -> Result<String, AppError> {
        let v = typed(schema.type_of(field), scalar(value)?);
        Ok(self.bind(v))
    }
}

/// Quote identifier for PostgreSQL.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Row alias carrying the raw value of `column` on select-where-in queries. Never a field name.
pub fn key_alias(column: &str) -> String {
    format!("{}{}", KEY_ALIAS_PREFIX, column)
}

/// Scalar to bind for a field value. Embedded relation objects contribute their `id`.
fn scalar(v: &Value) -> Result<Value, AppError> {
    match v {
        Value::Object(obj) => match obj.get("id") {
            Some(id) if !id.is_object() && !id.is_array() => Ok(id.clone()),
            _ => Err(AppError::Validation("nested object values are not supported".into())),
        },
        Value::Array(_) => Err(AppError::Validation("array values are not supported".into())),
        v => Ok(v.clone()),
    }
}

/// Coerce to the column type (`"5"` for an integer column binds as 5).
fn typed(ty: Option<ColumnType>, v: Value) -> Value {
    match (ty, id_text(&v)) {
        (Some(ty), Some(text)) => cast_value(ty, Some(&text)),
        _ => v,
    }
}

/// SELECT list: every column aliased to its field, then each belongsTo key aliased to `fk_as`.
fn select_column_list(schema: &Schema) -> String {
    schema
        .columns
        .iter()
        .map(|c| (c.column.as_str(), c.field.as_str()))
        .chain(schema.belongs_to.iter().map(|b| (b.fk_field.as_str(), b.fk_as.as_str())))
        .map(|(column, alias)| format!("{}::text AS {}", quoted(column), quoted(alias)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// ` WHERE ...` for a filter, or empty. Unknown fields are skipped.
fn where_clause(q: &mut QueryBuf, schema: &Schema, filter: &Filter) -> Result<String, AppError> {
    let mut parts = Vec::new();
    for (field, value) in filter.iter() {
        let Some(column) = schema.column_for(field) else {
            tracing::debug!(schema = %schema.name, field = %field, "ignoring filter on unknown field");
            continue;
        };
        let column = quoted(column);
        let part = match value {
            Value::Null => format!("{} IS NULL", column),
            Value::Array(values) if values.is_empty() => "1 = 0".to_string(),
            Value::Array(values) => {
                let placeholders = values
                    .iter()
                    .map(|v| q.bind_field(schema, field, v))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("{} IN ({})", column, placeholders.join(", "))
            }
            v => format!("{} = {}", column, q.bind_field(schema, field, v)?),
        };
        parts.push(part);
    }
    Ok(if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    })
}

fn order_clause(schema: &Schema, order_by: &[OrderBy]) -> String {
    let parts: Vec<String> = order_by
        .iter()
        .filter_map(|o| {
            schema
                .column_for(&o.field)
                .map(|c| format!("{} {}", quoted(c), o.direction.as_sql()))
        })
        .collect();
    if parts.is_empty() {
        format!(" ORDER BY {}", quoted(&schema.id.column))
    } else {
        format!(" ORDER BY {}", parts.join(", "))
    }
}

/// SELECT with filter, ORDER BY (default: identifier), optional LIMIT/OFFSET.
pub fn select_many(schema: &Schema, opts: &SelectOptions) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::default();
    let filter = where_clause(&mut q, schema, &opts.filter)?;
    let limit = opts
        .limit
        .map(|n| format!(" LIMIT {}", n.min(MAX_LIMIT)))
        .unwrap_or_default();
    let offset = opts.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        select_column_list(schema),
        quoted(&schema.table_name),
        filter,
        order_clause(schema, &opts.order_by),
        limit,
        offset
    );
    Ok(q)
}

/// SELECT by identifier.
pub fn select_one(schema: &Schema, id: &Value) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::default();
    let id = q.bind_field(schema, schema.id_field(), id)?;
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(schema),
        quoted(&schema.table_name),
        quoted(&schema.id.column),
        id
    );
    Ok(q)
}

/// Existence check by identifier; returns one row with a `count` column.
pub fn exists(schema: &Schema, id: &Value) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::default();
    let id = q.bind_field(schema, schema.id_field(), id)?;
    q.sql = format!(
        "SELECT COUNT(*)::text AS \"count\" FROM {} WHERE {} = {}",
        quoted(&schema.table_name),
        quoted(&schema.id.column),
        id
    );
    Ok(q)
}

/// Rows of `related` whose `key_column` appears in `SELECT owner_column FROM owner WHERE owner_filter`.
/// With `expose_key`, the raw key column is also selected under [`key_alias`].
pub fn select_where_in(
    related: &Schema,
    key_column: &str,
    expose_key: bool,
    owner: &Schema,
    owner_column: &str,
    owner_filter: &Filter,
) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::default();
    let mut cols = select_column_list(related);
    if expose_key {
        cols.push_str(&format!(", {}::text AS {}", quoted(key_column), quoted(&key_alias(key_column))));
    }
    let owner_where = where_clause(&mut q, owner, owner_filter)?;
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} IN (SELECT {} FROM {}{}) ORDER BY {}",
        cols,
        quoted(&related.table_name),
        quoted(key_column),
        quoted(owner_column),
        quoted(&owner.table_name),
        owner_where,
        quoted(&related.id.column)
    );
    Ok(q)
}

/// Column/placeholder pairs for the fields of `data` the schema maps to columns. First field wins per column.
fn assignments(
    q: &mut QueryBuf,
    schema: &Schema,
    data: &Row,
    skip_id: bool,
) -> Result<Vec<(String, String)>, AppError> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (field, value) in data {
        let Some(column) = schema.column_for(field) else {
            continue;
        };
        if skip_id && column == schema.id.column {
            continue;
        }
        if !seen.insert(column.to_string()) {
            continue;
        }
        out.push((quoted(column), q.bind_field(schema, field, value)?));
    }
    Ok(out)
}

/// INSERT of the mapped fields of `data`.
pub fn insert(schema: &Schema, data: &Row) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::default();
    let pairs = assignments(&mut q, schema, data, false)?;
    let table = quoted(&schema.table_name);
    q.sql = if pairs.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", table)
    } else {
        let (cols, vals): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        format!("INSERT INTO {} ({}) VALUES ({})", table, cols.join(", "), vals.join(", "))
    };
    Ok(q)
}

/// UPDATE by identifier; `None` when `data` sets no column.
pub fn update(schema: &Schema, id: &Value, data: &Row) -> Result<Option<QueryBuf>, AppError> {
    let mut q = QueryBuf::default();
    let pairs = assignments(&mut q, schema, data, true)?;
    if pairs.is_empty() {
        return Ok(None);
    }
    let sets: Vec<String> = pairs.into_iter().map(|(c, v)| format!("{} = {}", c, v)).collect();
    let id = q.bind_field(schema, schema.id_field(), id)?;
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        quoted(&schema.table_name),
        sets.join(", "),
        quoted(&schema.id.column),
        id
    );
    Ok(Some(q))
}

/// DELETE rows matching a non-empty filter.
pub fn delete(schema: &Schema, filter: &Filter) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::default();
    let clause = where_clause(&mut q, schema, filter)?;
    if clause.is_empty() {
        return Err(AppError::Validation("refusing to delete without a filter".into()));
    }
    q.sql = format!("DELETE FROM {}{}", quoted(&schema.table_name), clause);
    Ok(q)
}

/// Detach children: set `child.fk_column` to NULL where it references a parent matching `owner_filter`.
pub fn nullify_children(
    child: &Schema,
    fk_column: &str,
    owner: &Schema,
    owner_filter: &Filter,
) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::default();
    let owner_where = where_clause(&mut q, owner, owner_filter)?;
    let fk = quoted(fk_column);
    q.sql = format!(
        "UPDATE {} SET {} = NULL WHERE {} IN (SELECT {} FROM {}{})",
        quoted(&child.table_name),
        fk,
        fk,
        quoted(&owner.id.column),
        quoted(&owner.table_name),
        owner_where
    );
    Ok(q)
}
