use serde_json::{json, Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::Model;
use crate::database::store::{RowStore, StoreError};
use crate::filter::FilterData;

/// Typed access to one table of the row store
pub struct Repository<T> {
    store: Arc<dyn RowStore>,
    _phantom: PhantomData<T>,
}

impl<T: Model> Repository<T> {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    fn decode(row: Value) -> Result<T, StoreError> {
        serde_json::from_value(row).map_err(|e| StoreError::MalformedRow {
            table: T::TABLE.to_string(),
            reason: e.to_string(),
        })
    }

    fn decode_all(rows: Vec<Value>) -> Result<Vec<T>, StoreError> {
        rows.into_iter().map(Self::decode).collect()
    }

    /// Serialize a record for writing; absent optionals are left to column defaults
    fn encode(record: &T) -> Result<Map<String, Value>, StoreError> {
        match serde_json::to_value(record)? {
            Value::Object(map) => Ok(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
            other => Err(StoreError::MalformedRow {
                table: T::TABLE.to_string(),
                reason: format!("record serialized to {}", other),
            }),
        }
    }

    fn by_id(id: Uuid) -> FilterData {
        FilterData::where_(json!({ "id": id }))
    }

    pub async fn select_any(&self, filter_data: FilterData) -> Result<Vec<T>, StoreError> {
        let rows = self.store.select(T::TABLE, filter_data).await?;
        Self::decode_all(rows)
    }

    pub async fn select_one(&self, mut filter_data: FilterData) -> Result<Option<T>, StoreError> {
        filter_data.limit = Some(1);
        let mut rows = self.store.select(T::TABLE, filter_data).await?;
        match rows.pop() {
            Some(row) => Ok(Some(Self::decode(row)?)),
            None => Ok(None),
        }
    }

    pub async fn select_404(&self, filter_data: FilterData) -> Result<T, StoreError> {
        self.select_one(filter_data)
            .await?
            .ok_or_else(|| StoreError::Database(DatabaseError::NotFound(format!("{} record not found", T::TABLE))))
    }

    pub async fn select_id(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        self.select_one(Self::by_id(id)).await
    }

    pub async fn select_ids(&self, ids: &[Uuid]) -> Result<Vec<T>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        self.select_any(FilterData::where_(json!({ "id": { "$in": ids } })))
            .await
    }

    pub async fn insert(&self, record: &T) -> Result<T, StoreError> {
        let row = self.store.insert(T::TABLE, Self::encode(record)?).await?;
        Self::decode(row)
    }

    pub async fn update_where(&self, filter_data: FilterData, changes: Map<String, Value>) -> Result<Vec<T>, StoreError> {
        let rows = self.store.update(T::TABLE, filter_data, changes).await?;
        Self::decode_all(rows)
    }

    /// Partial update of one row; `None` when the id does not exist
    pub async fn update_id(&self, id: Uuid, changes: Map<String, Value>) -> Result<Option<T>, StoreError> {
        Ok(self.update_where(Self::by_id(id), changes).await?.pop())
    }

    pub async fn delete_where(&self, filter_data: FilterData) -> Result<Vec<T>, StoreError> {
        let rows = self.store.delete(T::TABLE, filter_data).await?;
        Self::decode_all(rows)
    }

    pub async fn delete_id(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        Ok(self.delete_where(Self::by_id(id)).await?.pop())
    }
}
