// src/state.rs
// Explicit application assembly. Every component is constructed here and
// injected into the handlers through State - no ambient process-wide
// connection or cache.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{ExternalCache, InMemoryCache, SnapshotCache};
use crate::config::{PlanboardConfig, StorageMode};
use crate::scanner::WorkspaceScanner;
use crate::store::Store;
use crate::sync::{CacheBackend, StoreBackend, SyncBackend, SyncOrchestrator};

pub struct AppState {
    pub config: PlanboardConfig,
    pub backend: Arc<dyn SyncBackend>,
    pub orchestrator: SyncOrchestrator,
    // Kept only so maintenance paths can tear the shared handle down.
    store: Option<Arc<Store>>,
}

impl AppState {
    pub fn from_config(config: PlanboardConfig) -> Self {
        let scanner = Arc::new(WorkspaceScanner::new(
            config.workspace_root.as_str(),
            config.output_content_max,
        ));
        let ttl = Duration::from_secs(config.cache_ttl_secs);

        let (backend, store): (Arc<dyn SyncBackend>, Option<Arc<Store>>) = match config.storage_mode
        {
            StorageMode::Store => {
                let store = Arc::new(Store::new(
                    config.database_url.clone(),
                    config.sqlite_max_connections,
                ));
                (
                    Arc::new(StoreBackend::new(store.clone(), config.cache_ttl_secs)),
                    Some(store),
                )
            }
            StorageMode::Cache => {
                let cache: Arc<dyn SnapshotCache> = Arc::new(InMemoryCache::new(ttl));
                (Arc::new(CacheBackend::new(cache, scanner.clone())), None)
            }
            StorageMode::ExternalCache => {
                let store = Arc::new(Store::new(
                    config.database_url.clone(),
                    config.sqlite_max_connections,
                ));
                let cache: Arc<dyn SnapshotCache> = Arc::new(ExternalCache::new(store.clone(), ttl));
                (
                    Arc::new(CacheBackend::new(cache, scanner.clone())),
                    Some(store),
                )
            }
        };

        let orchestrator = SyncOrchestrator::new(scanner, backend.clone());

        Self {
            config,
            backend,
            orchestrator,
            store,
        }
    }

    /// Maintenance teardown: closes the shared store handle for every
    /// caller. One-shot commands only - never request-serving paths.
    pub async fn shutdown(&self) {
        if let Some(store) = &self.store {
            store.close().await;
        }
    }
}
