// src/sync/mod.rs
// Sync orchestration. Three triggers (manual, periodic, push) converge on
// one publish step whose destination is the configured backend - durable
// store or staleness cache, never both in one deployment.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::SnapshotCache;
use crate::records::{Output, Project, Snapshot, SyncCounts, Task};
use crate::scanner::WorkspaceScanner;
use crate::store::{OutputFilter, ProjectFilter, Store, TaskFilter};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("workspace scan failed: {0:#}")]
    Scan(anyhow::Error),
    #[error("publish failed: {0:#}")]
    Publish(anyhow::Error),
    #[error("push payload missing field `{0}`")]
    InvalidPayload(&'static str),
}

/// Body of a push-trigger request: an already-parsed snapshot supplied by an
/// external process. All three arrays are required; a missing one rejects
/// the whole payload before any mutation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayload {
    pub projects: Option<Vec<Project>>,
    pub tasks: Option<Vec<Task>>,
    pub outputs: Option<Vec<Output>>,
    pub last_sync: Option<String>,
}

impl SyncPayload {
    pub fn into_snapshot(self) -> Result<Snapshot, SyncError> {
        let projects = self.projects.ok_or(SyncError::InvalidPayload("projects"))?;
        let tasks = self.tasks.ok_or(SyncError::InvalidPayload("tasks"))?;
        let outputs = self.outputs.ok_or(SyncError::InvalidPayload("outputs"))?;
        Ok(Snapshot::new(projects, tasks, outputs, self.last_sync))
    }
}

/// Health of the serving backend, exposed at /api/health.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub backend: &'static str,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_age_secs: Option<i64>,
}

/// Destination of the publish step and source of every read. One
/// implementation per deployment, chosen by configuration at startup.
#[async_trait]
pub trait SyncBackend: Send + Sync {
    async fn publish(&self, snapshot: Snapshot) -> Result<SyncCounts>;
    async fn is_fresh(&self) -> bool;
    async fn projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>>;
    async fn tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>>;
    async fn outputs(&self, filter: &OutputFilter) -> Result<Vec<Output>>;
    async fn health(&self) -> HealthReport;
}

// ============================================================================
// Store-backed deployment
// ============================================================================

pub struct StoreBackend {
    store: Arc<Store>,
    ttl_secs: u64,
}

impl StoreBackend {
    pub fn new(store: Arc<Store>, ttl_secs: u64) -> Self {
        Self { store, ttl_secs }
    }
}

#[async_trait]
impl SyncBackend for StoreBackend {
    async fn publish(&self, snapshot: Snapshot) -> Result<SyncCounts> {
        self.store.sync_all(&snapshot).await
    }

    async fn is_fresh(&self) -> bool {
        match self.store.last_sync_age_secs().await {
            Ok(Some(age)) => age < self.ttl_secs as i64,
            _ => false,
        }
    }

    async fn projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>> {
        self.store.projects().await?.get_all(filter).await
    }

    async fn tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.store.tasks().await?.get_all(filter).await
    }

    async fn outputs(&self, filter: &OutputFilter) -> Result<Vec<Output>> {
        self.store.outputs().await?.get_all(filter).await
    }

    async fn health(&self) -> HealthReport {
        let healthy = self.store.health_check().await.is_ok();
        let data_age_secs = self.store.last_sync_age_secs().await.ok().flatten();
        HealthReport {
            backend: "store",
            healthy,
            data_age_secs,
        }
    }
}

// ============================================================================
// Cache-backed deployment
// ============================================================================

/// Read-through cache deployment: a valid snapshot serves reads directly;
/// a miss rescans the workspace, republishes, then serves.
pub struct CacheBackend {
    cache: Arc<dyn SnapshotCache>,
    scanner: Arc<WorkspaceScanner>,
}

impl CacheBackend {
    pub fn new(cache: Arc<dyn SnapshotCache>, scanner: Arc<WorkspaceScanner>) -> Self {
        Self { cache, scanner }
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        if let Some(snapshot) = self.cache.get().await {
            return Ok(snapshot);
        }
        debug!("Cache miss, rescanning workspace");
        let snapshot = scan_snapshot(self.scanner.clone()).await?;
        self.cache.set(snapshot.clone()).await;
        Ok(snapshot)
    }
}

#[async_trait]
impl SyncBackend for CacheBackend {
    async fn publish(&self, snapshot: Snapshot) -> Result<SyncCounts> {
        let counts = snapshot.counts();
        self.cache.set(snapshot).await;
        Ok(counts)
    }

    async fn is_fresh(&self) -> bool {
        self.cache.is_valid().await
    }

    async fn projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>> {
        let snapshot = self.snapshot().await?;
        let mut projects: Vec<Project> = snapshot
            .projects
            .into_iter()
            .filter(|project| filter.matches(project))
            .collect();
        projects.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(projects)
    }

    async fn tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let snapshot = self.snapshot().await?;
        let mut tasks: Vec<Task> = snapshot
            .tasks
            .into_iter()
            .filter(|task| filter.matches(task))
            .collect();
        tasks.sort_by(|a, b| b.updated.cmp(&a.updated));
        Ok(tasks)
    }

    async fn outputs(&self, filter: &OutputFilter) -> Result<Vec<Output>> {
        let snapshot = self.snapshot().await?;
        let mut outputs: Vec<Output> = snapshot
            .outputs
            .into_iter()
            .filter(|output| filter.matches(output))
            .collect();
        outputs.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(outputs)
    }

    async fn health(&self) -> HealthReport {
        HealthReport {
            backend: "cache",
            healthy: true,
            data_age_secs: self.cache.age_secs().await,
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Outcome of the periodic trigger: either the data was still fresh or a
/// full resync ran.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodicOutcome {
    pub refreshed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synced: Option<SyncCounts>,
}

pub struct SyncOrchestrator {
    scanner: Arc<WorkspaceScanner>,
    backend: Arc<dyn SyncBackend>,
}

impl SyncOrchestrator {
    pub fn new(scanner: Arc<WorkspaceScanner>, backend: Arc<dyn SyncBackend>) -> Self {
        Self { scanner, backend }
    }

    /// Manual trigger: always rescan and republish, bypassing freshness.
    /// A scan or publish failure leaves the previously published data in
    /// place - there is no partial publish.
    pub async fn sync_manual(&self) -> Result<SyncCounts, SyncError> {
        let snapshot = scan_snapshot(self.scanner.clone())
            .await
            .map_err(SyncError::Scan)?;
        let counts = self
            .backend
            .publish(snapshot)
            .await
            .map_err(SyncError::Publish)?;
        info!(
            "Manual sync published {} projects, {} tasks, {} outputs",
            counts.projects, counts.tasks, counts.outputs
        );
        Ok(counts)
    }

    /// Periodic trigger: rescan only when the published data has gone stale.
    pub async fn sync_periodic(&self) -> Result<PeriodicOutcome, SyncError> {
        if self.backend.is_fresh().await {
            debug!("Periodic sync skipped, data still fresh");
            return Ok(PeriodicOutcome {
                refreshed: false,
                synced: None,
            });
        }
        let counts = self.sync_manual().await?;
        Ok(PeriodicOutcome {
            refreshed: true,
            synced: Some(counts),
        })
    }

    /// Push trigger: republish an externally supplied snapshot without
    /// touching the filesystem. The payload is validated before any
    /// mutation.
    pub async fn sync_push(&self, payload: SyncPayload) -> Result<SyncCounts, SyncError> {
        let snapshot = payload.into_snapshot()?;
        let counts = self
            .backend
            .publish(snapshot)
            .await
            .map_err(SyncError::Publish)?;
        info!(
            "Push sync published {} projects, {} tasks, {} outputs",
            counts.projects, counts.tasks, counts.outputs
        );
        Ok(counts)
    }
}

/// Run the blocking workspace walk off the async runtime and bundle the
/// result into a snapshot.
async fn scan_snapshot(scanner: Arc<WorkspaceScanner>) -> Result<Snapshot> {
    let result = tokio::task::spawn_blocking(move || scanner.scan())
        .await
        .map_err(|err| anyhow::anyhow!("Scan task panicked: {err}"))??;
    let last_sync = Some(chrono::Utc::now().to_rfc3339());
    Ok(result.into_snapshot(last_sync))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::parser::output::DEFAULT_CONTENT_MAX;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn seed_workspace() -> TempDir {
        let root = TempDir::new().unwrap();
        let alpha = root.path().join("project-alpha");
        fs::create_dir_all(alpha.join("tasks")).unwrap();
        fs::write(alpha.join("overview.md"), "# PROJ: Alpha\n").unwrap();
        fs::write(alpha.join("tasks").join("T-001.md"), "# T-001: Only task\n").unwrap();
        root
    }

    fn cache_setup(root: &TempDir) -> (Arc<InMemoryCache>, SyncOrchestrator) {
        let cache = Arc::new(InMemoryCache::new(Duration::from_secs(300)));
        let scanner = Arc::new(WorkspaceScanner::new(root.path(), DEFAULT_CONTENT_MAX));
        let backend = Arc::new(CacheBackend::new(cache.clone(), scanner.clone()));
        (cache, SyncOrchestrator::new(scanner, backend))
    }

    #[tokio::test]
    async fn test_manual_sync_publishes_to_cache() {
        let root = seed_workspace();
        let (cache, orchestrator) = cache_setup(&root);

        let counts = orchestrator.sync_manual().await.unwrap();
        assert_eq!(counts.projects, 1);
        assert_eq!(counts.tasks, 1);
        assert_eq!(counts.outputs, 0);
        assert!(cache.is_valid().await);
    }

    #[tokio::test]
    async fn test_periodic_sync_skips_when_fresh() {
        let root = seed_workspace();
        let (_cache, orchestrator) = cache_setup(&root);

        orchestrator.sync_manual().await.unwrap();
        let outcome = orchestrator.sync_periodic().await.unwrap();
        assert!(!outcome.refreshed);
        assert!(outcome.synced.is_none());
    }

    #[tokio::test]
    async fn test_periodic_sync_refreshes_when_stale() {
        let root = seed_workspace();
        let (_cache, orchestrator) = cache_setup(&root);

        let outcome = orchestrator.sync_periodic().await.unwrap();
        assert!(outcome.refreshed);
        assert_eq!(outcome.synced.unwrap().projects, 1);
    }

    #[tokio::test]
    async fn test_push_with_missing_array_is_rejected_without_mutation() {
        let root = seed_workspace();
        let (cache, orchestrator) = cache_setup(&root);

        let payload = SyncPayload {
            projects: Some(vec![]),
            tasks: Some(vec![]),
            outputs: None,
            last_sync: None,
        };
        let err = orchestrator.sync_push(payload).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidPayload("outputs")));
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_cache_backend_reads_through_on_miss() {
        let root = seed_workspace();
        let cache = Arc::new(InMemoryCache::new(Duration::from_secs(300)));
        let scanner = Arc::new(WorkspaceScanner::new(root.path(), DEFAULT_CONTENT_MAX));
        let backend = CacheBackend::new(cache.clone(), scanner);

        // Nothing published yet: the read repopulates the cache itself.
        let tasks = backend.tasks(&TaskFilter::default()).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(cache.is_valid().await);
    }
}
