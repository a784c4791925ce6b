use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::models::Model;
use crate::database::{Repository, RowStore};

/// Shared handles passed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RowStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn RowStore>, config: AppConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn repo<T: Model>(&self) -> Repository<T> {
        Repository::new(self.store.clone())
    }
}
