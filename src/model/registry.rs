//! Model registry: model name -> Model. Built once at startup, read-only afterwards, shared by `Arc`.

use crate::config::{resolve_schema, RawSchema};
use crate::db::Database;
use crate::error::{AppError, ConfigError};
use crate::model::Model;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<Model>>,
    by_resource_type: HashMap<String, String>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve and register every raw schema against one database.
    pub fn from_schemas(raws: &[RawSchema], db: Arc<dyn Database>) -> Result<Self, AppError> {
        let mut registry = ModelRegistry::new();
        for raw in raws {
            let schema = resolve_schema(raw)?;
            registry.register(Model::new(schema, db.clone()))?;
        }
        for (model, relation) in registry.dangling_relations() {
            tracing::warn!(model = %model, relation = %relation, "relation targets an unregistered model");
        }
        tracing::info!(models = registry.models.len(), "model registry populated");
        Ok(registry)
    }

    pub fn register(&mut self, model: Model) -> Result<Arc<Model>, ConfigError> {
        let name = model.name().to_string();
        if self.models.contains_key(&name) {
            return Err(ConfigError::DuplicateModel(name));
        }
        let model = Arc::new(model);
        self.by_resource_type
            .insert(model.schema().resource_type.clone(), name.clone());
        self.models.insert(name, model.clone());
        Ok(model)
    }

    /// `None` when no model carries that name; callers decide how to fail.
    pub fn get(&self, name: &str) -> Option<Arc<Model>> {
        self.models.get(name).cloned()
    }

    pub fn get_ref(&self, name: &str) -> Option<&Model> {
        self.models.get(name).map(|m| m.as_ref())
    }

    /// Lookup by JSON-API type / route segment, e.g. `user-groups`.
    pub fn by_resource_type(&self, resource_type: &str) -> Option<Arc<Model>> {
        self.by_resource_type
            .get(resource_type)
            .and_then(|name| self.get(name))
    }

    /// `(model, relation)` pairs whose relation names no registered model.
    pub fn dangling_relations(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for model in self.models.values() {
            let schema = model.schema();
            let targets = schema
                .belongs_to
                .iter()
                .map(|b| &b.relation_model_name)
                .chain(schema.has_many.iter().map(|h| &h.relation_model_name));
            for target in targets {
                if !self.models.contains_key(target) {
                    out.push((schema.name.clone(), target.clone()));
                }
            }
        }
        out.sort();
        out
    }
}
