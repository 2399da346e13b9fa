//! API wrapper: Model + RelationResolver + Serializer/Deserializer per request.
//! Writes run in one transaction; a referential-integrity failure rolls the whole batch back.

use crate::db::{finish, Executor};
use crate::error::AppError;
use crate::jsonapi::{deserialize, Document, SerializeOptions, Serializer};
use crate::model::{id_text, ids_equal, Model, ModelRegistry, Row};
use crate::service::{RelationResolver, RequestValidator};
use crate::sql::{Filter, SelectOptions};
use serde_json::Value;

const DEFAULT_LIMIT: u32 = 100;
const BULK_LIMIT: usize = 100;

/// Listing and lookup options after query-string parsing.
#[derive(Clone, Debug, Default)]
pub struct FetchOptions {
    pub select: SelectOptions,
    pub serialize: SerializeOptions,
}

pub struct ApiService;

impl ApiService {
    /// List rows (limit defaults to 100), embed relations when requested, serialize with `meta`.
    pub async fn api_fetch_all(
        registry: &ModelRegistry,
        model: &Model,
        opts: &FetchOptions,
    ) -> Result<Document, AppError> {
        let serializer = Serializer::new(registry, model.schema());
        serializer.check(&opts.serialize)?;

        let mut select = opts.select.clone();
        select.limit = Some(select.limit.unwrap_or(DEFAULT_LIMIT));
        let mut rows = model.select_many(&select).await?;
        if opts.serialize.with_related && !rows.is_empty() {
            let ids: Vec<Value> = rows
                .iter()
                .filter_map(|r| r.get(model.schema().id_field()).cloned())
                .collect();
            let parents = Filter::new().eq(model.schema().id_field(), Value::Array(ids));
            rows = RelationResolver::new(registry, model.schema())
                .fetch_and_embed(rows, &parents)
                .await?;
        }
        tracing::debug!(model = %model.name(), count = rows.len(), "fetched");
        serializer.serialize_many(&rows, &opts.serialize)
    }

    pub async fn api_find(
        registry: &ModelRegistry,
        model: &Model,
        id: &Value,
        opts: &SerializeOptions,
    ) -> Result<Document, AppError> {
        let serializer = Serializer::new(registry, model.schema());
        serializer.check(opts)?;

        let row = model
            .select_one(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} with id {}", model.name(), id)))?;
        let row = if opts.with_related {
            let by_id = Filter::by_id(model.schema().id_field(), id);
            RelationResolver::new(registry, model.schema())
                .fetch_and_embed(vec![row], &by_id)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| AppError::NotFound(format!("{} with id {}", model.name(), id)))?
        } else {
            row
        };
        serializer.serialize_one(&row, opts)
    }

    /// Create from a document holding one resource or an array of them.
    pub async fn api_create(registry: &ModelRegistry, model: &Model, document: &Value) -> Result<Document, AppError> {
        let incoming = deserialize(model.schema(), document)?;
        let created = Self::api_create_many(registry, model, &incoming.rows).await?;
        let serializer = Serializer::new(registry, model.schema());
        let opts = SerializeOptions::default();
        match (incoming.many, created.first()) {
            (false, Some(row)) => serializer.serialize_one(row, &opts),
            _ => serializer.serialize_many(&created, &opts),
        }
    }

    /// Insert every row, then verify each belongsTo key exists; all or nothing.
    pub async fn api_create_many(registry: &ModelRegistry, model: &Model, rows: &[Row]) -> Result<Vec<Row>, AppError> {
        if rows.len() > BULK_LIMIT {
            return Err(AppError::Validation(format!("bulk create limited to {} items", BULK_LIMIT)));
        }
        for row in rows {
            RequestValidator::validate(row, &model.schema().validation)?;
        }

        let tx = model.database().begin().await.map_err(AppError::Db)?;
        let result = async {
            let mut created = Vec::with_capacity(rows.len());
            for row in rows {
                created.push(model.create_in(&*tx, row).await?);
            }
            for row in &created {
                Self::check_references(registry, model, &*tx, row).await?;
            }
            Ok::<_, AppError>(created)
        }
        .await;
        let created = finish(tx, result).await?;
        tracing::info!(model = %model.name(), count = created.len(), "created");
        Ok(created)
    }

    pub async fn api_update(
        registry: &ModelRegistry,
        model: &Model,
        id: &Value,
        document: &Value,
    ) -> Result<Document, AppError> {
        let mut row = deserialize(model.schema(), document)?.into_one()?;
        let id_field = model.schema().id_field();
        if let Some(body_id) = row.remove(id_field) {
            if !ids_equal(&body_id, id) {
                return Err(AppError::Validation(format!(
                    "resource id '{}' does not match '{}'",
                    id_text(&body_id).unwrap_or_default(),
                    id_text(id).unwrap_or_default()
                )));
            }
        }
        RequestValidator::validate_partial(&row, &model.schema().validation)?;

        let tx = model.database().begin().await.map_err(AppError::Db)?;
        let result = async {
            let updated = model.update_in(&*tx, id, &row).await?;
            Self::check_references(registry, model, &*tx, &updated).await?;
            Ok::<_, AppError>(updated)
        }
        .await;
        let updated = finish(tx, result).await?;
        tracing::info!(model = %model.name(), id = %id, "updated");
        Serializer::new(registry, model.schema()).serialize_one(&updated, &SerializeOptions::default())
    }

    /// Delete one row; children of every hasMany get their key nullified, not deleted.
    pub async fn api_delete(registry: &ModelRegistry, model: &Model, id: &Value) -> Result<(), AppError> {
        let children = model
            .schema()
            .has_many
            .iter()
            .map(|h| {
                registry
                    .get(&h.relation_model_name)
                    .map(|child| (child, h.fk_field.as_str()))
                    .ok_or_else(|| AppError::MissingModel(h.relation_model_name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let children: Vec<(&Model, &str)> = children.iter().map(|(m, fk)| (m.as_ref(), *fk)).collect();
        let by_id = Filter::by_id(model.schema().id_field(), id);

        let tx = model.database().begin().await.map_err(AppError::Db)?;
        let result = async {
            if !model.exists_in(&*tx, id).await? {
                return Err(AppError::NotFound(format!("{} with id {}", model.name(), id)));
            }
            model.delete_in(&*tx, &by_id, &children).await
        }
        .await;
        finish(tx, result).await?;
        tracing::info!(model = %model.name(), id = %id, "deleted");
        Ok(())
    }

    async fn check_references<E: Executor + ?Sized>(
        registry: &ModelRegistry,
        model: &Model,
        exec: &E,
        row: &Row,
    ) -> Result<(), AppError> {
        for b in &model.schema().belongs_to {
            let Some(key) = row.get(&b.fk_as).filter(|v| !v.is_null()) else {
                continue;
            };
            let related = registry
                .get(&b.relation_model_name)
                .ok_or_else(|| AppError::MissingModel(b.relation_model_name.clone()))?;
            if !related.exists_in(exec, key).await? {
                return Err(AppError::RelatedRecordNotFound {
                    id: id_text(key).unwrap_or_default(),
                    kind: b.model_field_name.clone(),
                });
            }
        }
        Ok(())
    }
}
