use std::sync::Arc;
use tracing::info;

use crate::{
    config::{Config, StoreBackend},
    infrastructure::{DocumentStore, MemoryStore, SqliteStore},
    services::{ProfileLoader, RelationshipManager},
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub profiles: ProfileLoader,
    pub relationships: RelationshipManager,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn DocumentStore> = match config.store.backend {
            StoreBackend::Memory => {
                info!("Using in-memory document store");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::Sqlite => {
                info!("Using sqlite document store at {}", config.store.url);
                Arc::new(SqliteStore::connect(&config.store.url).await?)
            }
        };
        Ok(Self::with_store(store, config))
    }

    /// State over an existing store; used by tests and embedders
    pub fn with_store(store: Arc<dyn DocumentStore>, config: Config) -> Self {
        Self {
            profiles: ProfileLoader::new(Arc::clone(&store), config.collections.clone()),
            relationships: RelationshipManager::new(
                Arc::clone(&store),
                config.collections.users.clone(),
            ),
            store,
            config,
        }
    }
}
