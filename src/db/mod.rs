//! Database executor seam: statement and parameters in, raw text rows out.

mod params;
mod postgres;
#[cfg(test)]
pub(crate) mod testing;

use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;

pub use params::PgBindValue;
pub use postgres::PgDatabase;

/// One result row: column alias to raw text value, in select order. NULL is `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawRow(pub Vec<(String, Option<String>)>);

impl RawRow {
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == alias)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, Option<V>)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        RawRow(iter.into_iter().map(|(k, v)| (k.into(), v.map(Into::into))).collect())
    }
}

/// Runs one statement with `$n` parameters. Failures carry the driver's message.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn exec(&self, query: &str, params: &[Value]) -> Result<Vec<RawRow>, String>;
}

/// A connection source that can also open transactions.
#[async_trait]
pub trait Database: Executor {
    async fn begin(&self) -> Result<Box<dyn Transaction>, String>;
}

#[async_trait]
pub trait Transaction: Executor {
    async fn commit(self: Box<Self>) -> Result<(), String>;
    async fn rollback(self: Box<Self>) -> Result<(), String>;
}

/// Commit on success, roll back on failure. The original error wins over a rollback failure.
pub async fn finish<T>(tx: Box<dyn Transaction>, result: Result<T, AppError>) -> Result<T, AppError> {
    match result {
        Ok(v) => {
            tx.commit().await.map_err(AppError::Db)?;
            Ok(v)
        }
        Err(e) => {
            tracing::warn!(error = %e, "rolling back transaction");
            if let Err(rb) = tx.rollback().await {
                tracing::error!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}
