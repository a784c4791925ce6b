use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::{Map, Value};
use sqlx::{PgPool, Row};
use thiserror::Error;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::query_builder::{bind_param_query, QueryBuilder};
use crate::filter::{FilterData, FilterError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Malformed {table} row: {reason}")]
    MalformedRow { table: String, reason: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(DatabaseError::Sqlx(err))
    }
}

/// Table-oriented row store. Rows are JSON objects keyed by column name.
/// There are no multi-statement transactions; each call stands alone.
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn select(&self, table: &str, filter: FilterData) -> Result<Vec<Value>, StoreError>;

    /// Insert one row and return it as stored
    async fn insert(&self, table: &str, row: Map<String, Value>) -> Result<Value, StoreError>;

    /// Apply `changes` to every matching row; returns the updated rows
    async fn update(&self, table: &str, filter: FilterData, changes: Map<String, Value>) -> Result<Vec<Value>, StoreError>;

    /// Delete every matching row; returns the deleted rows
    async fn delete(&self, table: &str, filter: FilterData) -> Result<Vec<Value>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    /// Short backend name for health output and logs
    fn backend(&self) -> &'static str;
}

/// Postgres-backed store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_rows(&self, table: &str, query: &str, params: &[Value]) -> Result<Vec<Value>, StoreError> {
        if crate::config::config().database.enable_query_logging {
            tracing::debug!(table, query, params = params.len(), "executing store query");
        }

        let mut q = sqlx::query(query);
        for p in params.iter() {
            q = bind_param_query(q, p);
        }

        let mut rows = q.fetch(&self.pool);
        let mut out = Vec::new();
        while let Some(row) = rows.try_next().await? {
            let value: Value = row.try_get("row")?;
            out.push(value);
        }
        Ok(out)
    }
}

#[async_trait]
impl RowStore for PgStore {
    async fn select(&self, table: &str, filter: FilterData) -> Result<Vec<Value>, StoreError> {
        let sql = QueryBuilder::new(table)?.select(filter)?;
        self.fetch_rows(table, &sql.query, &sql.params).await
    }

    async fn insert(&self, table: &str, row: Map<String, Value>) -> Result<Value, StoreError> {
        let sql = QueryBuilder::new(table)?.insert(&row)?;
        self.fetch_rows(table, &sql.query, &sql.params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Database(DatabaseError::QueryError(format!("insert into {} returned no row", table))))
    }

    async fn update(&self, table: &str, filter: FilterData, changes: Map<String, Value>) -> Result<Vec<Value>, StoreError> {
        let sql = QueryBuilder::new(table)?.update(filter, &changes)?;
        self.fetch_rows(table, &sql.query, &sql.params).await
    }

    async fn delete(&self, table: &str, filter: FilterData) -> Result<Vec<Value>, StoreError> {
        let sql = QueryBuilder::new(table)?.delete(filter)?;
        self.fetch_rows(table, &sql.query, &sql.params).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        DatabaseManager::health_check(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
