//! Resolved schema: descriptors normalized once at registration, immutable afterwards.

use crate::case::resource_type;
use crate::config::ValidationRule;
use crate::error::AppError;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Primitive column type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Integer,
    Boolean,
    Id,
}

impl ColumnType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "string" => Some(ColumnType::String),
            "integer" => Some(ColumnType::Integer),
            "boolean" => Some(ColumnType::Boolean),
            "id" => Some(ColumnType::Id),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    /// Row-level field name.
    pub field: String,
    /// Column name in the legacy table.
    pub column: String,
    pub ty: ColumnType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BelongsTo {
    pub model_field_name: String,
    pub relation_model_name: String,
    /// Column on this table holding the key.
    pub fk_field: String,
    /// Row-level alias of the key before embedding.
    pub fk_as: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HasMany {
    pub model_field_name: String,
    pub relation_model_name: String,
    /// Column on the related table holding our key.
    pub fk_field: String,
}

/// Tagged field descriptor, one per declared field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldDescriptor {
    Column(ColumnDef),
    BelongsTo(BelongsTo),
    HasMany(HasMany),
}

/// A field's validation rule with its `pattern` compiled at registration.
#[derive(Clone, Debug, Default)]
pub struct FieldRule {
    pub rule: ValidationRule,
    pub pattern: Option<Regex>,
}

impl FieldRule {
    pub fn compile(field: &str, rule: &ValidationRule) -> Result<Self, AppError> {
        let pattern = rule
            .pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| AppError::Validation(format!("field '{}': invalid pattern: {}", field, e)))?;
        Ok(FieldRule {
            rule: rule.clone(),
            pattern,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Schema {
    pub name: String,
    pub resource_type: String,
    pub table_name: String,
    /// Identifier column definition (field defaults to `id`).
    pub id: ColumnDef,
    /// Every column-backed field including the identifier, in declaration order.
    pub columns: Vec<ColumnDef>,
    /// Non-relation fields plus `fk_as` and `model_field_name` of each belongsTo, in declaration order.
    pub attributes: Vec<String>,
    pub belongs_to: Vec<BelongsTo>,
    pub has_many: Vec<HasMany>,
    pub sensitive: HashSet<String>,
    pub public: bool,
    pub validation: HashMap<String, FieldRule>,
}

impl Schema {
    pub fn new(name: &str, table_name: &str, id: ColumnDef) -> Self {
        Schema {
            name: name.to_string(),
            resource_type: resource_type(name),
            table_name: table_name.to_string(),
            columns: vec![id.clone()],
            attributes: vec![id.field.clone()],
            id,
            belongs_to: Vec::new(),
            has_many: Vec::new(),
            sensitive: HashSet::new(),
            public: false,
            validation: HashMap::new(),
        }
    }

    pub fn id_field(&self) -> &str {
        &self.id.field
    }

    /// Column backing a row field: plain columns, a belongsTo `fk_as`, or its `model_field_name`.
    pub fn column_for(&self, field: &str) -> Option<&str> {
        if let Some(c) = self.columns.iter().find(|c| c.field == field) {
            return Some(&c.column);
        }
        self.belongs_to
            .iter()
            .find(|b| b.fk_as == field || b.model_field_name == field)
            .map(|b| b.fk_field.as_str())
    }

    /// Type of a row field; foreign keys carry the `Id` type.
    pub fn type_of(&self, field: &str) -> Option<ColumnType> {
        if let Some(c) = self.columns.iter().find(|c| c.field == field) {
            return Some(c.ty);
        }
        self.belongs_to
            .iter()
            .any(|b| b.fk_as == field || b.model_field_name == field)
            .then_some(ColumnType::Id)
    }

    pub fn belongs_to_named(&self, model_field_name: &str) -> Option<&BelongsTo> {
        self.belongs_to.iter().find(|b| b.model_field_name == model_field_name)
    }

    pub fn has_many_named(&self, model_field_name: &str) -> Option<&HasMany> {
        self.has_many.iter().find(|h| h.model_field_name == model_field_name)
    }

    /// Belongs-to on this schema pointing at `model`; one on `fk_field` wins over any other.
    pub fn reverse_link(&self, model: &str, fk_field: &str) -> Option<&BelongsTo> {
        self.belongs_to
            .iter()
            .find(|b| b.relation_model_name == model && b.fk_field == fk_field)
            .or_else(|| self.belongs_to.iter().find(|b| b.relation_model_name == model))
    }

    pub fn is_sensitive(&self, field: &str) -> bool {
        self.sensitive.contains(field)
    }

    /// Builder-style helpers, mostly for tests and programmatic schemas.
    pub fn column(mut self, field: &str, column: &str, ty: ColumnType) -> Self {
        self.columns.push(ColumnDef {
            field: field.to_string(),
            column: column.to_string(),
            ty,
        });
        self.attributes.push(field.to_string());
        self
    }

    pub fn with_belongs_to(mut self, field: &str, relation: &str, fk_field: &str, fk_as: &str) -> Self {
        self.belongs_to.push(BelongsTo {
            model_field_name: field.to_string(),
            relation_model_name: relation.to_string(),
            fk_field: fk_field.to_string(),
            fk_as: fk_as.to_string(),
        });
        self.attributes.push(fk_as.to_string());
        self.attributes.push(field.to_string());
        self
    }

    pub fn with_has_many(mut self, field: &str, relation: &str, fk_field: &str) -> Self {
        self.has_many.push(HasMany {
            model_field_name: field.to_string(),
            relation_model_name: relation.to_string(),
            fk_field: fk_field.to_string(),
        });
        self
    }

    pub fn require_column(&self, field: &str) -> Result<&str, AppError> {
        self.column_for(field)
            .ok_or_else(|| AppError::Validation(format!("unknown field '{}' on '{}'", field, self.name)))
    }
}
