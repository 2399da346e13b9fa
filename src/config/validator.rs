//! Schema validation: mandatory table, single identifier, unique foreign-key aliases.

use crate::config::resolved::{ColumnType, FieldDescriptor};
use crate::config::{resolve_field, RawSchema};
use crate::error::AppError;
use std::collections::HashSet;

pub fn validate(raw: &RawSchema) -> Result<(), AppError> {
    if raw.name.trim().is_empty() {
        return Err(AppError::Validation("schema name is required".into()));
    }
    if raw.table_name.as_deref().map(str::trim).unwrap_or("").is_empty() {
        return Err(AppError::Validation(format!("schema '{}': tableName is required", raw.name)));
    }

    let mut ids = 0;
    let mut column_fields = HashSet::new();
    let mut fk_aliases = HashSet::new();
    for (name, field) in &raw.fields {
        match resolve_field(name, field)? {
            FieldDescriptor::Column(c) => {
                if c.ty == ColumnType::Id {
                    ids += 1;
                }
                column_fields.insert(c.field);
            }
            FieldDescriptor::BelongsTo(b) => {
                if !fk_aliases.insert(b.fk_as.clone()) {
                    return Err(AppError::Validation(format!(
                        "schema '{}': fkAs '{}' is declared twice",
                        raw.name, b.fk_as
                    )));
                }
            }
            FieldDescriptor::HasMany(_) => {}
        }
    }
    if ids > 1 {
        return Err(AppError::Validation(format!(
            "schema '{}': at most one identifier field is allowed",
            raw.name
        )));
    }
    if let Some(clash) = fk_aliases.iter().find(|a| column_fields.contains(*a)) {
        return Err(AppError::Validation(format!(
            "schema '{}': fkAs '{}' collides with a column field",
            raw.name, clash
        )));
    }
    for field in &raw.sensitive {
        if !column_fields.contains(field) {
            tracing::warn!(schema = %raw.name, field = %field, "sensitive field is not a column");
        }
    }
    Ok(())
}
