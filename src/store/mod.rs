// src/store/mod.rs
// SQLite-backed document store. One shared connection pool, established
// lazily on first use and reused by every caller; an explicit close() tears
// it down for all of them, so only maintenance paths may call it.

pub mod outputs;
pub mod projects;
pub mod tasks;

pub use outputs::{OutputFilter, OutputStore};
pub use projects::{ProjectFilter, ProjectStore};
pub use tasks::{TaskFilter, TaskStore};

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::records::{Snapshot, SyncCounts};

/// Failure of a full-snapshot sync. Each kind's batch is transactional on
/// its own, but there is no rollback across kinds: when one batch fails the
/// other two may already be committed, and the caller retries wholesale.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("batch sync failed for {}: {detail}; other kinds may have committed", .failed.join(", "))]
    PartialSync {
        failed: Vec<&'static str>,
        detail: String,
    },
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS projects (
        slug TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        objective TEXT NOT NULL,
        success_metrics TEXT NOT NULL DEFAULT '[]',
        status TEXT NOT NULL,
        priority TEXT NOT NULL,
        stakeholder TEXT,
        planner TEXT,
        target_date TEXT,
        last_updated INTEGER NOT NULL,
        path TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS tasks (
        project TEXT NOT NULL,
        id TEXT NOT NULL,
        title TEXT NOT NULL,
        owner TEXT NOT NULL,
        status TEXT NOT NULL,
        priority TEXT NOT NULL,
        depends_on TEXT,
        created INTEGER NOT NULL,
        updated INTEGER NOT NULL,
        goal TEXT,
        acceptance_criteria TEXT NOT NULL DEFAULT '[]',
        outputs TEXT,
        path TEXT NOT NULL,
        PRIMARY KEY (project, id)
    )",
    "CREATE TABLE IF NOT EXISTS outputs (
        id TEXT PRIMARY KEY,
        project TEXT NOT NULL,
        task TEXT,
        title TEXT NOT NULL,
        output_type TEXT NOT NULL,
        content TEXT,
        path TEXT NOT NULL,
        last_modified INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sync_state (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        last_sync TEXT,
        synced_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS snapshot_cache (
        key TEXT PRIMARY KEY,
        payload TEXT NOT NULL,
        stored_at INTEGER NOT NULL
    )",
];

pub struct Store {
    database_url: String,
    max_connections: u32,
    pool: OnceCell<SqlitePool>,
}

impl Store {
    pub fn new(database_url: impl Into<String>, max_connections: u32) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections,
            pool: OnceCell::new(),
        }
    }

    /// The shared pool, established at most once. Concurrent first callers
    /// all observe the same handle.
    pub async fn pool(&self) -> Result<&SqlitePool> {
        self.pool
            .get_or_try_init(|| async {
                let pool = SqlitePoolOptions::new()
                    .max_connections(self.max_connections)
                    .acquire_timeout(Duration::from_secs(10))
                    .connect(&self.database_url)
                    .await
                    .with_context(|| {
                        format!("Failed to connect to document store at {}", self.database_url)
                    })?;
                init_schema(&pool).await?;
                info!("Document store connected: {}", self.database_url);
                Ok(pool)
            })
            .await
    }

    pub async fn projects(&self) -> Result<ProjectStore> {
        Ok(ProjectStore::new(self.pool().await?.clone()))
    }

    pub async fn tasks(&self) -> Result<TaskStore> {
        Ok(TaskStore::new(self.pool().await?.clone()))
    }

    pub async fn outputs(&self) -> Result<OutputStore> {
        Ok(OutputStore::new(self.pool().await?.clone()))
    }

    /// Liveness probe independent of any query.
    pub async fn health_check(&self) -> Result<()> {
        let pool = self.pool().await?;
        sqlx::query("SELECT 1")
            .execute(pool)
            .await
            .context("Store health check failed")?;
        Ok(())
    }

    /// Terminal teardown. Invalidates the shared handle for every caller
    /// regardless of in-flight use; only maintenance paths (the one-shot
    /// sync command) call this, never request handlers.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }

    /// Replace the stored contents with a fresh snapshot. The three batches
    /// run concurrently as independent operations with no ordering guarantee
    /// between them.
    pub async fn sync_all(&self, snapshot: &Snapshot) -> Result<SyncCounts> {
        let pool = self.pool().await?;
        let projects = ProjectStore::new(pool.clone());
        let tasks = TaskStore::new(pool.clone());
        let outputs = OutputStore::new(pool.clone());

        let (p, t, o) = tokio::join!(
            projects.store_batch(&snapshot.projects),
            tasks.store_batch(&snapshot.tasks),
            outputs.store_batch(&snapshot.outputs),
        );

        let mut failed = Vec::new();
        let mut detail = String::new();
        for (kind, result) in [("projects", &p), ("tasks", &t), ("outputs", &o)] {
            if let Err(err) = result {
                warn!("Batch store of {} failed: {:#}", kind, err);
                failed.push(kind);
                detail = format!("{err:#}");
            }
        }
        if !failed.is_empty() {
            return Err(StoreError::PartialSync { failed, detail }.into());
        }

        self.record_sync(snapshot.last_sync.as_deref()).await?;

        Ok(SyncCounts {
            projects: p?,
            tasks: t?,
            outputs: o?,
        })
    }

    /// Record the instant of the last successful full sync.
    pub async fn record_sync(&self, last_sync: Option<&str>) -> Result<()> {
        let pool = self.pool().await?;
        sqlx::query(
            r#"
            INSERT INTO sync_state (id, last_sync, synced_at)
            VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                last_sync = excluded.last_sync,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(last_sync)
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await
        .context("Failed to record sync state")?;
        Ok(())
    }

    /// Seconds since the last recorded sync; None when never synced.
    pub async fn last_sync_age_secs(&self) -> Result<Option<i64>> {
        let pool = self.pool().await?;
        let synced_at: Option<i64> =
            sqlx::query_scalar("SELECT synced_at FROM sync_state WHERE id = 1")
                .fetch_optional(pool)
                .await
                .context("Failed to read sync state")?;
        Ok(synced_at.map(|ts| Utc::now().timestamp() - ts))
    }
}

async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to initialize store schema")?;
    }
    Ok(())
}
