//! Resolve raw schemas into descriptor lists, and load them from a resource directory.

use crate::case::to_camel_case;
use crate::config::resolved::{BelongsTo, ColumnDef, ColumnType, FieldDescriptor, FieldRule, HasMany, Schema};
use crate::config::types::RawSchema;
use crate::config::validate;
use crate::error::{AppError, ConfigError};
use serde_json::{Map, Value};
use std::path::Path;

/// Relation descriptors of one schema, in field declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelationDescriptors {
    pub belongs_to: Vec<BelongsTo>,
    pub has_many: Vec<HasMany>,
    /// Non-relation fields plus `fk_as` then `model_field_name` of each belongsTo.
    pub attributes: Vec<String>,
}

/// Classify one declared field.
pub fn resolve_field(name: &str, raw: &Value) -> Result<FieldDescriptor, AppError> {
    match raw {
        Value::String(tag) => {
            let ty = ColumnType::from_tag(tag)
                .ok_or_else(|| AppError::Validation(format!("field '{}': unknown type '{}'", name, tag)))?;
            Ok(FieldDescriptor::Column(ColumnDef {
                field: name.to_string(),
                column: name.to_string(),
                ty,
            }))
        }
        Value::Object(obj) => resolve_object_field(name, obj),
        _ => Err(AppError::Validation(format!(
            "field '{}': expected a type tag or a descriptor object",
            name
        ))),
    }
}

fn resolve_object_field(name: &str, obj: &Map<String, Value>) -> Result<FieldDescriptor, AppError> {
    let str_key = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);

    if let Some(relation) = str_key("belongsTo") {
        let fk_field = str_key("fkField").unwrap_or_else(|| to_camel_case(&relation));
        let fk_as = str_key("fkAs").unwrap_or_else(|| format!("{}Id", name));
        return Ok(FieldDescriptor::BelongsTo(BelongsTo {
            model_field_name: name.to_string(),
            relation_model_name: relation,
            fk_field,
            fk_as,
        }));
    }
    if let Some(relation) = str_key("hasMany") {
        let fk_field = str_key("fkField")
            .ok_or_else(|| AppError::Validation(format!("hasMany field '{}' requires fkField", name)))?;
        return Ok(FieldDescriptor::HasMany(HasMany {
            model_field_name: name.to_string(),
            relation_model_name: relation,
            fk_field,
        }));
    }
    if let Some(tag) = str_key("type") {
        let ty = ColumnType::from_tag(&tag)
            .ok_or_else(|| AppError::Validation(format!("field '{}': unknown type '{}'", name, tag)))?;
        return Ok(FieldDescriptor::Column(ColumnDef {
            field: name.to_string(),
            column: str_key("column").unwrap_or_else(|| name.to_string()),
            ty,
        }));
    }
    if obj.contains_key("fkField") || obj.contains_key("fkAs") {
        return Err(AppError::Validation(format!("field '{}': belongsTo is missing", name)));
    }
    Err(AppError::Validation(format!(
        "field '{}': expected one of type, belongsTo, hasMany",
        name
    )))
}

/// Scan every field and collect relation descriptors and the attribute list.
pub fn resolve_relations(fields: &Map<String, Value>) -> Result<RelationDescriptors, AppError> {
    let mut out = RelationDescriptors::default();
    for (name, raw) in fields {
        match resolve_field(name, raw)? {
            FieldDescriptor::Column(c) => out.attributes.push(c.field),
            FieldDescriptor::BelongsTo(b) => {
                out.attributes.push(b.fk_as.clone());
                out.attributes.push(b.model_field_name.clone());
                out.belongs_to.push(b);
            }
            FieldDescriptor::HasMany(h) => out.has_many.push(h),
        }
    }
    Ok(out)
}

/// Build the runtime schema for one model (validates first).
pub fn resolve_schema(raw: &RawSchema) -> Result<Schema, AppError> {
    validate(raw)?;
    let table_name = raw.table_name.as_deref().unwrap_or_default();

    let mut columns = Vec::new();
    for (name, field) in &raw.fields {
        if let FieldDescriptor::Column(c) = resolve_field(name, field)? {
            columns.push(c);
        }
    }
    let id = columns
        .iter()
        .find(|c| c.ty == ColumnType::Id)
        .or_else(|| columns.iter().find(|c| c.field == "id"))
        .cloned();
    let relations = resolve_relations(&raw.fields)?;
    let mut attributes = relations.attributes;
    let id = match id {
        Some(id) => id,
        None => {
            let implicit = ColumnDef {
                field: "id".into(),
                column: "id".into(),
                ty: ColumnType::Id,
            };
            columns.insert(0, implicit.clone());
            attributes.insert(0, implicit.field.clone());
            implicit
        }
    };

    let mut schema = Schema::new(&raw.name, table_name, id);
    schema.columns = columns;
    schema.attributes = attributes;
    schema.belongs_to = relations.belongs_to;
    schema.has_many = relations.has_many;
    schema.sensitive = raw.sensitive.iter().cloned().collect();
    schema.public = raw.public;
    schema.validation = raw
        .validation
        .iter()
        .map(|(field, rule)| Ok((field.clone(), FieldRule::compile(field, rule)?)))
        .collect::<Result<_, AppError>>()?;
    Ok(schema)
}

pub fn parse_schema(json: &str) -> Result<RawSchema, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Read every `*.json` file in `dir` as a raw schema, sorted by file name.
pub async fn load_schemas_from_dir(dir: &Path) -> Result<Vec<RawSchema>, ConfigError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", dir.display(), e)))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConfigError::Load(e.to_string()))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loading schema");
        out.push(parse_schema(&text)?);
    }
    Ok(out)
}
