//! PostgreSQL executor over a sqlx pool. Every selected column is cast to text by the query
//! builder, so values are read back as strings.

use super::{Database, Executor, PgBindValue, RawRow, Transaction};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        PgDatabase { pool }
    }
}

fn bound<'q>(sql: &'q str, params: &[Value]) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(sql);
    for p in params {
        query = query.bind(PgBindValue::from_json(p));
    }
    query
}

#[async_trait]
impl Executor for PgDatabase {
    async fn exec(&self, query: &str, params: &[Value]) -> Result<Vec<RawRow>, String> {
        let rows = bound(query, params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.to_string())?;
        Ok(rows.iter().map(row_to_raw).collect())
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn begin(&self) -> Result<Box<dyn Transaction>, String> {
        let tx = self.pool.begin().await.map_err(|e| e.to_string())?;
        Ok(Box::new(PgTransaction {
            tx: Mutex::new(Some(tx)),
        }))
    }
}

struct PgTransaction {
    tx: Mutex<Option<sqlx::Transaction<'static, Postgres>>>,
}

#[async_trait]
impl Executor for PgTransaction {
    async fn exec(&self, query: &str, params: &[Value]) -> Result<Vec<RawRow>, String> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(|| "transaction already closed".to_string())?;
        let rows = bound(query, params)
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| e.to_string())?;
        Ok(rows.iter().map(row_to_raw).collect())
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(self: Box<Self>) -> Result<(), String> {
        match self.tx.into_inner() {
            Some(tx) => tx.commit().await.map_err(|e| e.to_string()),
            None => Err("transaction already closed".into()),
        }
    }

    async fn rollback(self: Box<Self>) -> Result<(), String> {
        match self.tx.into_inner() {
            Some(tx) => tx.rollback().await.map_err(|e| e.to_string()),
            None => Ok(()),
        }
    }
}

fn row_to_raw(row: &PgRow) -> RawRow {
    use sqlx::{Column, Row};
    RawRow(
        row.columns()
            .iter()
            .map(|col| {
                let value = row.try_get::<Option<String>, _>(col.ordinal()).ok().flatten();
                (col.name().to_string(), value)
            })
            .collect(),
    )
}
