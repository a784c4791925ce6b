pub mod manager;
pub mod memory;
pub mod models;
pub mod query_builder;
pub mod repository;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use repository::Repository;
pub use store::{PgStore, RowStore, StoreError};

use std::sync::Arc;

use crate::config::DatabaseConfig;

/// Postgres when a database url is configured, otherwise an in-process store
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn RowStore>, DatabaseError> {
    if config.url.is_none() {
        if crate::is_production!() {
            return Err(DatabaseError::ConfigMissing("DATABASE_URL"));
        }
        tracing::warn!("DATABASE_URL not set; using the in-memory store, data will not persist");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let pool = DatabaseManager::connect(config).await?;
    Ok(Arc::new(PgStore::new(pool)))
}
