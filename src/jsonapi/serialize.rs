//! Rows (embedded or flat) -> JSON-API resources.

use super::{Document, Resource};
use crate::case::{resource_type, to_kebab_case};
use crate::config::Schema;
use crate::error::AppError;
use crate::model::{id_text, ModelRegistry, Row};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

#[derive(Clone, Debug, Default)]
pub struct SerializeOptions {
    /// Attribute projection by row field name; `None` keeps every attribute.
    pub fields_only: Option<Vec<String>>,
    /// Emit `included` with the full related resources.
    pub with_related: bool,
}

impl SerializeOptions {
    fn keeps(&self, field: &str) -> bool {
        self.fields_only
            .as_ref()
            .map_or(true, |fields| fields.iter().any(|f| f == field))
    }
}

pub struct Serializer<'a> {
    registry: &'a ModelRegistry,
    schema: &'a Schema,
}

impl<'a> Serializer<'a> {
    pub fn new(registry: &'a ModelRegistry, schema: &'a Schema) -> Self {
        Serializer { registry, schema }
    }

    /// hasMany linkage is a list of ids; projecting the id away while including it is contradictory.
    pub fn check(&self, opts: &SerializeOptions) -> Result<(), AppError> {
        if opts.with_related && !self.schema.has_many.is_empty() && !opts.keeps(self.schema.id_field()) {
            return Err(AppError::Validation(
                "wrong query: `include` option with `id` filtered out by `fieldsOnly`".into(),
            ));
        }
        Ok(())
    }

    pub fn serialize_many(&self, rows: &[Row], opts: &SerializeOptions) -> Result<Document, AppError> {
        self.check(opts)?;
        let data = rows
            .iter()
            .map(|row| self.resource(self.schema, row, opts))
            .collect::<Result<Vec<_>, _>>()?;
        let included = if opts.with_related { self.included(rows)? } else { Vec::new() };
        Ok(Document::many(data, included))
    }

    pub fn serialize_one(&self, row: &Row, opts: &SerializeOptions) -> Result<Document, AppError> {
        self.check(opts)?;
        let data = self.resource(self.schema, row, opts)?;
        let included = if opts.with_related {
            self.included(std::slice::from_ref(row))?
        } else {
            Vec::new()
        };
        Ok(Document::one(data, included))
    }

    fn related_schema(&self, model_name: &str) -> Result<&'a Schema, AppError> {
        self.registry
            .get_ref(model_name)
            .map(|m| m.schema())
            .ok_or_else(|| AppError::MissingModel(model_name.to_string()))
    }

    fn resource(&self, schema: &Schema, row: &Row, opts: &SerializeOptions) -> Result<Resource, AppError> {
        let mut attributes = Map::new();
        for col in &schema.columns {
            if col.field == schema.id.field || schema.is_sensitive(&col.field) || !opts.keeps(&col.field) {
                continue;
            }
            if let Some(v) = row.get(&col.field) {
                attributes.insert(to_kebab_case(&col.field), v.clone());
            }
        }

        let mut relationships = Map::new();
        for b in &schema.belongs_to {
            let related_id = self.related_schema(&b.relation_model_name)?.id_field();
            let key = match row.get(&b.model_field_name) {
                Some(Value::Object(o)) => o.get(related_id).or_else(|| o.get("id")),
                Some(Value::Null) => None,
                Some(scalar) => Some(scalar),
                None => match row.get(&b.fk_as) {
                    Some(fk) => Some(fk),
                    None => continue,
                },
            };
            let linkage = key
                .and_then(id_text)
                .map(|id| json!({ "id": id, "type": resource_type(&b.relation_model_name) }))
                .unwrap_or(Value::Null);
            relationships.insert(to_kebab_case(&b.model_field_name), json!({ "data": linkage }));
        }
        for h in &schema.has_many {
            let Some(Value::Array(children)) = row.get(&h.model_field_name) else {
                continue;
            };
            let related_id = self.related_schema(&h.relation_model_name)?.id_field();
            let kind = resource_type(&h.relation_model_name);
            let linkage: Vec<Value> = children
                .iter()
                .filter_map(|c| c.get(related_id).or_else(|| c.get("id")).and_then(id_text))
                .map(|id| json!({ "id": id, "type": kind }))
                .collect();
            relationships.insert(to_kebab_case(&h.model_field_name), json!({ "data": linkage }));
        }

        Ok(Resource {
            id: row.get(schema.id_field()).and_then(id_text),
            kind: schema.resource_type.clone(),
            attributes,
            relationships,
        })
    }

    /// Every embedded related row, serialized per its own schema, first occurrence of each `{type, id}` only.
    /// Bare `{id}` stubs carry nothing worth including.
    fn included(&self, rows: &[Row]) -> Result<Vec<Resource>, AppError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let all = SerializeOptions::default();
        for row in rows {
            let mut related: Vec<(&str, &Map<String, Value>)> = Vec::new();
            for b in &self.schema.belongs_to {
                if let Some(Value::Object(o)) = row.get(&b.model_field_name) {
                    if o.keys().any(|k| k != "id") {
                        related.push((b.relation_model_name.as_str(), o));
                    }
                }
            }
            for h in &self.schema.has_many {
                if let Some(Value::Array(children)) = row.get(&h.model_field_name) {
                    related.extend(
                        children
                            .iter()
                            .filter_map(Value::as_object)
                            .map(|c| (h.relation_model_name.as_str(), c)),
                    );
                }
            }
            for (model_name, obj) in related {
                let schema = self.related_schema(model_name)?;
                let resource = self.resource(schema, obj, &all)?;
                let identity = (resource.kind.clone(), resource.id.clone());
                if seen.insert(identity) {
                    out.push(resource);
                }
            }
        }
        Ok(out)
    }
}
