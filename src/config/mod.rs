// src/config/mod.rs
// All tunables load from the environment (.env supported), each with a
// working default. The struct is built once in main and handed to the
// components that need it - no process-global config.

use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct PlanboardConfig {
    // ── Workspace
    pub workspace_root: String,
    pub output_content_max: usize,

    // ── Storage
    pub database_url: String,
    pub sqlite_max_connections: u32,
    pub storage_mode: StorageMode,
    pub cache_ttl_secs: u64,

    // ── Server
    pub host: String,
    pub port: u16,
    pub cors_origin: String,

    // ── Cron
    pub cron_secret: Option<String>,

    // ── Logging
    pub log_level: String,
}

/// Which backend the sync triggers publish to. One per running instance;
/// the triggers never target different backends in the same deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageMode {
    /// Durable SQLite-backed document store.
    Store,
    /// Process-local in-memory snapshot cache.
    Cache,
    /// SQLite-persisted snapshot cache shared across restarts.
    ExternalCache,
}

impl FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "store" => Ok(StorageMode::Store),
            "cache" => Ok(StorageMode::Cache),
            "external-cache" | "external_cache" => Ok(StorageMode::ExternalCache),
            _ => Err(format!("Unknown storage mode: {s}")),
        }
    }
}

/// Read an env var, trim trailing comments and whitespace, and fall back to
/// the default when the variable is unset or unparseable.
fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            clean_val.parse::<T>().unwrap_or(default)
        }
        Err(_) => default,
    }
}

fn env_var_opt(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim().to_string();
            if clean_val.is_empty() {
                None
            } else {
                Some(clean_val)
            }
        }
        Err(_) => None,
    }
}

impl PlanboardConfig {
    pub fn from_env() -> Self {
        Self {
            workspace_root: env_var_or("PLANBOARD_WORKSPACE_ROOT", "./workspace".to_string()),
            output_content_max: env_var_or("PLANBOARD_OUTPUT_CONTENT_MAX", 16384),
            database_url: env_var_or("DATABASE_URL", "sqlite:./planboard.db".to_string()),
            sqlite_max_connections: env_var_or("PLANBOARD_SQLITE_MAX_CONNECTIONS", 5),
            storage_mode: env_var_or("PLANBOARD_STORAGE_MODE", StorageMode::Store),
            cache_ttl_secs: env_var_or("PLANBOARD_CACHE_TTL_SECS", 300),
            host: env_var_or("PLANBOARD_HOST", "0.0.0.0".to_string()),
            port: env_var_or("PLANBOARD_PORT", 3400),
            cors_origin: env_var_or("PLANBOARD_CORS_ORIGIN", "http://localhost:3000".to_string()),
            cron_secret: env_var_opt("PLANBOARD_CRON_SECRET"),
            log_level: env_var_or("PLANBOARD_LOG_LEVEL", "info".to_string()),
        }
    }

    /// Server bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
