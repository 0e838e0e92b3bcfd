use crate::config::{Config, StorageBackend};
use crate::errors::Result;
use crate::ledger::LedgerEngine;
use crate::photos::PhotoStorage;
use crate::registry::BatchRegistry;
use crate::storage::{InventoryStore, MemoryStore, PgStore};
use std::sync::Arc;
use tracing::info;

/// Everything the HTTP layer calls into, sharing one store.
pub struct InventoryService {
    pub registry: BatchRegistry,
    pub ledger: LedgerEngine,
    pub photos: PhotoStorage,
}

impl InventoryService {
    pub fn new(store: Arc<dyn InventoryStore>, config: &Config) -> Self {
        InventoryService {
            registry: BatchRegistry::new(store.clone(), config.inventory.recommend_window_days),
            ledger: LedgerEngine::new(store.clone()),
            photos: PhotoStorage::new(
                store,
                config.storage.media_root.clone(),
                config.storage.max_upload_bytes,
            ),
        }
    }

    /// Open the configured backend and run migrations when it is PostgreSQL.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store: Arc<dyn InventoryStore> = match config.database.backend {
            StorageBackend::Postgres => {
                let store = PgStore::connect(
                    &config.database.url,
                    config.database.max_connections,
                    config.database.min_connections,
                )
                .await?;
                store.migrate().await?;
                info!("Using PostgreSQL inventory store");
                Arc::new(store)
            }
            StorageBackend::Memory => {
                info!("Using in-memory inventory store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self::new(store, config))
    }
}
