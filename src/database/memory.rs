use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::store::{RowStore, StoreError};
use crate::filter::{Filter, FilterData, FilterMatch};

/// In-process row store evaluated with the same filter grammar as Postgres.
/// Backs the test suite and runs the server when no database is configured.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching(filter: &Filter, rows: &[Value]) -> Result<Vec<bool>, StoreError> {
        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            hits.push(FilterMatch::matches(filter.where_data(), row)?);
        }
        Ok(hits)
    }

    /// Number of rows currently held in `table`
    pub async fn len(&self, table: &str) -> usize {
        self.tables.read().await.get(table).map(Vec::len).unwrap_or(0)
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn select(&self, table: &str, filter: FilterData) -> Result<Vec<Value>, StoreError> {
        let filter = Filter::from_data(table, filter)?;
        let tables = self.tables.read().await;
        match tables.get(table) {
            Some(rows) => Ok(FilterMatch::apply(&filter, rows)?),
            None => Ok(vec![]),
        }
    }

    async fn insert(&self, table: &str, mut row: Map<String, Value>) -> Result<Value, StoreError> {
        // Validates the table name
        Filter::new(table)?;
        if row.get("id").map_or(true, Value::is_null) {
            row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        let row = Value::Object(row);
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, filter: FilterData, changes: Map<String, Value>) -> Result<Vec<Value>, StoreError> {
        let filter = Filter::from_data(table, filter)?;
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(vec![]);
        };

        // Evaluate every row before mutating so a filter error leaves the table untouched
        let hits = Self::matching(&filter, rows)?;
        let mut updated = Vec::new();
        for (row, hit) in rows.iter_mut().zip(hits) {
            if !hit {
                continue;
            }
            if let Value::Object(obj) = &mut *row {
                for (k, v) in &changes {
                    obj.insert(k.clone(), v.clone());
                }
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: FilterData) -> Result<Vec<Value>, StoreError> {
        let filter = Filter::from_data(table, filter)?;
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(vec![]);
        };

        let hits = Self::matching(&filter, rows)?;
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(rows.len());
        for (row, hit) in rows.drain(..).zip(hits) {
            if hit {
                removed.push(row);
            } else {
                kept.push(row);
            }
        }
        *rows = kept;
        Ok(removed)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
