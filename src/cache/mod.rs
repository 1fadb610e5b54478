// src/cache/mod.rs
// Staleness cache: holds the most recently published snapshot and answers
// "is my data still fresh" against a fixed TTL. Two interchangeable
// implementations: process-local (lost on restart) and SQLite-persisted
// (shared across restarts, best-effort on every error).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;

use crate::records::Snapshot;
use crate::store::Store;

pub const DEFAULT_TTL_SECS: u64 = 300;

const CACHE_KEY: &str = "current";

#[async_trait]
pub trait SnapshotCache: Send + Sync {
    /// The current snapshot when one exists and is within the TTL;
    /// otherwise no data, which callers treat as a cache miss.
    async fn get(&self) -> Option<Snapshot>;

    /// Store a new snapshot stamped with the current time, unconditionally
    /// replacing any previous one.
    async fn set(&self, snapshot: Snapshot);

    /// Discard the snapshot.
    async fn clear(&self);

    /// Whether a snapshot exists and is within the TTL.
    async fn is_valid(&self) -> bool;

    /// Seconds since the snapshot was captured, regardless of validity.
    async fn age_secs(&self) -> Option<i64>;
}

fn within_ttl(captured_at: DateTime<Utc>, ttl: Duration) -> bool {
    let age = Utc::now()
        .signed_duration_since(captured_at)
        .num_seconds();
    age < ttl.as_secs() as i64
}

// ============================================================================
// Process-local cache
// ============================================================================

/// In-memory snapshot cache. Consistent only within one running instance;
/// concurrent set() calls race and the last writer wins, which is fine
/// because every snapshot is a full, self-consistent bundle.
pub struct InMemoryCache {
    ttl: Duration,
    inner: RwLock<Option<Snapshot>>,
}

impl InMemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(None),
        }
    }

    /// Store a snapshot with an explicit capture instant. `set` delegates
    /// here with the current time; tests inject a past one.
    pub async fn set_at(&self, mut snapshot: Snapshot, at: DateTime<Utc>) {
        snapshot.captured_at = at;
        *self.inner.write().await = Some(snapshot);
    }
}

#[async_trait]
impl SnapshotCache for InMemoryCache {
    async fn get(&self) -> Option<Snapshot> {
        let guard = self.inner.read().await;
        guard
            .as_ref()
            .filter(|snapshot| within_ttl(snapshot.captured_at, self.ttl))
            .cloned()
    }

    async fn set(&self, snapshot: Snapshot) {
        self.set_at(snapshot, Utc::now()).await;
    }

    async fn clear(&self) {
        *self.inner.write().await = None;
    }

    async fn is_valid(&self) -> bool {
        let guard = self.inner.read().await;
        guard
            .as_ref()
            .map(|snapshot| within_ttl(snapshot.captured_at, self.ttl))
            .unwrap_or(false)
    }

    async fn age_secs(&self) -> Option<i64> {
        let guard = self.inner.read().await;
        guard.as_ref().map(|snapshot| {
            Utc::now()
                .signed_duration_since(snapshot.captured_at)
                .num_seconds()
        })
    }
}

// ============================================================================
// Externally-persisted cache
// ============================================================================

/// Snapshot cache persisted as a single SQLite row, shared across instances
/// and restarts under the same TTL rule. Reads that fail for any reason are
/// cache misses; writes are best-effort and never surface to the caller.
pub struct ExternalCache {
    store: Arc<Store>,
    ttl: Duration,
}

impl ExternalCache {
    pub fn new(store: Arc<Store>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    async fn read_row(&self) -> Option<(String, i64)> {
        let pool = match self.store.pool().await {
            Ok(pool) => pool,
            Err(err) => {
                warn!("Snapshot cache unavailable, treating as miss: {:#}", err);
                return None;
            }
        };
        let row: Result<Option<(String, i64)>, sqlx::Error> =
            sqlx::query_as("SELECT payload, stored_at FROM snapshot_cache WHERE key = ?")
                .bind(CACHE_KEY)
                .fetch_optional(pool)
                .await;
        match row {
            Ok(row) => row,
            Err(err) => {
                warn!("Snapshot cache read failed, treating as miss: {}", err);
                None
            }
        }
    }

    pub async fn set_at(&self, mut snapshot: Snapshot, at: DateTime<Utc>) {
        snapshot.captured_at = at;
        let payload = match serde_json::to_string(&snapshot) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("Could not serialize snapshot for cache: {}", err);
                return;
            }
        };
        let pool = match self.store.pool().await {
            Ok(pool) => pool,
            Err(err) => {
                warn!("Snapshot cache unavailable, write dropped: {:#}", err);
                return;
            }
        };
        let written = sqlx::query(
            r#"
            INSERT INTO snapshot_cache (key, payload, stored_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                stored_at = excluded.stored_at
            "#,
        )
        .bind(CACHE_KEY)
        .bind(payload)
        .bind(at.timestamp())
        .execute(pool)
        .await;
        if let Err(err) = written {
            warn!("Snapshot cache write failed: {}", err);
        }
    }
}

#[async_trait]
impl SnapshotCache for ExternalCache {
    async fn get(&self) -> Option<Snapshot> {
        let (payload, stored_at) = self.read_row().await?;
        let captured_at = DateTime::from_timestamp(stored_at, 0)?;
        if !within_ttl(captured_at, self.ttl) {
            return None;
        }
        match serde_json::from_str(&payload) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!("Snapshot cache payload unreadable, treating as miss: {}", err);
                None
            }
        }
    }

    async fn set(&self, snapshot: Snapshot) {
        self.set_at(snapshot, Utc::now()).await;
    }

    async fn clear(&self) {
        let Ok(pool) = self.store.pool().await else {
            return;
        };
        if let Err(err) = sqlx::query("DELETE FROM snapshot_cache WHERE key = ?")
            .bind(CACHE_KEY)
            .execute(pool)
            .await
        {
            warn!("Snapshot cache clear failed: {}", err);
        }
    }

    async fn is_valid(&self) -> bool {
        match self.read_row().await {
            Some((_, stored_at)) => DateTime::from_timestamp(stored_at, 0)
                .map(|captured_at| within_ttl(captured_at, self.ttl))
                .unwrap_or(false),
            None => false,
        }
    }

    async fn age_secs(&self) -> Option<i64> {
        let (_, stored_at) = self.read_row().await?;
        Some(Utc::now().timestamp() - stored_at)
    }
}
