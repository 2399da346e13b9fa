//! Model: a schema bound to a database. Reads and writes return type-cast rows.

mod cast;
mod registry;

pub use cast::{cast_row, cast_value, id_text, ids_equal};
pub use registry::ModelRegistry;

use crate::config::Schema;
use crate::db::{finish, Database, Executor};
use crate::error::AppError;
use crate::sql::{self, Filter, OrderBy, QueryBuf, SelectOptions};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A row: field name to JSON value, in select order.
pub type Row = Map<String, Value>;

pub struct Model {
    schema: Arc<Schema>,
    db: Arc<dyn Database>,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.schema.name)
            .field("table", &self.schema.table_name)
            .finish_non_exhaustive()
    }
}

impl Model {
    pub fn new(schema: Schema, db: Arc<dyn Database>) -> Self {
        Model {
            schema: Arc::new(schema),
            db,
        }
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn database(&self) -> &dyn Database {
        &*self.db
    }

    async fn query<E: Executor + ?Sized>(&self, exec: &E, q: &QueryBuf) -> Result<Vec<Row>, AppError> {
        tracing::debug!(model = %self.schema.name, sql = %q.sql, params = ?q.params, "query");
        let raw = exec.exec(&q.sql, &q.params).await.map_err(AppError::Db)?;
        Ok(raw.iter().map(|r| cast_row(&self.schema, r)).collect())
    }

    async fn execute<E: Executor + ?Sized>(&self, exec: &E, q: &QueryBuf) -> Result<(), AppError> {
        tracing::debug!(model = %self.schema.name, sql = %q.sql, params = ?q.params, "execute");
        exec.exec(&q.sql, &q.params).await.map_err(AppError::Db)?;
        Ok(())
    }

    pub async fn select_many(&self, opts: &SelectOptions) -> Result<Vec<Row>, AppError> {
        self.select_many_in(&*self.db, opts).await
    }

    pub async fn select_many_in<E: Executor + ?Sized>(
        &self,
        exec: &E,
        opts: &SelectOptions,
    ) -> Result<Vec<Row>, AppError> {
        let q = sql::select_many(&self.schema, opts)?;
        self.query(exec, &q).await
    }

    pub async fn select_one(&self, id: &Value) -> Result<Option<Row>, AppError> {
        self.select_one_in(&*self.db, id).await
    }

    pub async fn select_one_in<E: Executor + ?Sized>(&self, exec: &E, id: &Value) -> Result<Option<Row>, AppError> {
        let q = sql::select_one(&self.schema, id)?;
        Ok(self.query(exec, &q).await?.into_iter().next())
    }

    /// Rows whose `key_column` is among `owner_column` values of owner rows matching `owner_filter`.
    pub async fn select_where_in(
        &self,
        key_column: &str,
        expose_key: bool,
        owner: &Schema,
        owner_column: &str,
        owner_filter: &Filter,
    ) -> Result<Vec<Row>, AppError> {
        let q = sql::select_where_in(&self.schema, key_column, expose_key, owner, owner_column, owner_filter)?;
        self.query(&*self.db, &q).await
    }

    pub async fn exists_in<E: Executor + ?Sized>(&self, exec: &E, id: &Value) -> Result<bool, AppError> {
        let q = sql::exists(&self.schema, id)?;
        tracing::debug!(model = %self.schema.name, sql = %q.sql, params = ?q.params, "query");
        let raw = exec.exec(&q.sql, &q.params).await.map_err(AppError::Db)?;
        let count = raw
            .first()
            .and_then(|r| r.get("count"))
            .and_then(|c| c.trim().parse::<i64>().ok())
            .unwrap_or(0);
        Ok(count > 0)
    }

    /// Insert one row in its own transaction.
    pub async fn create(&self, data: &Row) -> Result<Row, AppError> {
        let tx = self.db.begin().await.map_err(AppError::Db)?;
        let result = self.create_in(&*tx, data).await;
        finish(tx, result).await
    }

    /// Insert, then re-select by the inserted values (no RETURNING on legacy tables).
    pub async fn create_in<E: Executor + ?Sized>(&self, exec: &E, data: &Row) -> Result<Row, AppError> {
        let q = sql::insert(&self.schema, data)?;
        self.execute(exec, &q).await?;

        let mut inserted = Filter::new();
        for (field, value) in data {
            if self.schema.column_for(field).is_some() && !value.is_array() {
                inserted = inserted.eq(field, value.clone());
            }
        }
        let opts = SelectOptions {
            filter: inserted,
            order_by: vec![OrderBy::desc(self.schema.id_field())],
            limit: Some(1),
            offset: None,
        };
        self.select_many_in(exec, &opts)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("{} row was not stored", self.schema.name)))
    }

    pub async fn update(&self, id: &Value, data: &Row) -> Result<Row, AppError> {
        let tx = self.db.begin().await.map_err(AppError::Db)?;
        let result = self.update_in(&*tx, id, data).await;
        finish(tx, result).await
    }

    /// Existence check, update, re-select by id.
    pub async fn update_in<E: Executor + ?Sized>(&self, exec: &E, id: &Value, data: &Row) -> Result<Row, AppError> {
        let not_found = || AppError::NotFound(format!("{} with id {}", self.schema.name, id));
        if !self.exists_in(exec, id).await? {
            return Err(not_found());
        }
        if let Some(q) = sql::update(&self.schema, id, data)? {
            self.execute(exec, &q).await?;
        }
        self.select_one_in(exec, id).await?.ok_or_else(not_found)
    }

    /// Set `fk_column` on this model's table to NULL wherever it points at an `owner` row matching `owner_filter`.
    pub async fn nullify_references_in<E: Executor + ?Sized>(
        &self,
        exec: &E,
        fk_column: &str,
        owner: &Schema,
        owner_filter: &Filter,
    ) -> Result<(), AppError> {
        let q = sql::nullify_children(&self.schema, fk_column, owner, owner_filter)?;
        self.execute(exec, &q).await
    }

    /// Delete matching rows after detaching children: each `(child, fk_column)` pair is nullified
    /// independently, never cascade-deleted.
    pub async fn delete_in<E: Executor + ?Sized>(
        &self,
        exec: &E,
        filter: &Filter,
        children: &[(&Model, &str)],
    ) -> Result<(), AppError> {
        for (child, fk_column) in children {
            child.nullify_references_in(exec, fk_column, &self.schema, filter).await?;
        }
        let q = sql::delete(&self.schema, filter)?;
        self.execute(exec, &q).await
    }
}
