//! Store Configuration
//!
//! [`StoreConfig`] selects a backend and carries the few tunables the engine
//! has. It deserializes from JSON, can be overridden from the environment, and
//! [`open_store`] turns it into a ready `Arc<dyn BlockStore>`.

use crate::db::{BlockStore, DatabaseError, DatabaseService, TursoStore, DEFAULT_BUSY_TIMEOUT_MS};
use crate::operations::DEFAULT_MAX_TREE_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

pub const ENV_BACKEND: &str = "BLOCKSTORE_BACKEND";
pub const ENV_DB_PATH: &str = "BLOCKSTORE_DB_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "BLOCKSTORE_BUSY_TIMEOUT_MS";

pub const DEFAULT_CASCADE_RETRY_ATTEMPTS: u32 = 3;

/// Storage backend to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// libsql / SQLite file
    #[default]
    Turso,
    /// Embedded SurrealDB, RocksDB on disk or in memory
    Surreal,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "turso" | "libsql" | "sqlite" => Ok(Self::Turso),
            "surreal" | "surrealdb" => Ok(Self::Surreal),
            other => Err(format!("Unknown backend '{}'", other)),
        }
    }
}

/// Engine configuration
///
/// # Examples
///
/// ```rust
/// use blockstore_core::config::{BackendKind, StoreConfig};
///
/// let config = StoreConfig::from_json_str(r#"{"backend": "surreal"}"#).unwrap();
/// assert_eq!(config.backend, BackendKind::Surreal);
/// assert_eq!(config.cascade_retry_attempts, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// Database file (Turso) or directory (Surreal); Surreal runs in memory without one
    pub database_path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    pub max_tree_depth: usize,
    pub cascade_retry_attempts: u32,
    pub namespace: String,
    pub database: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            database_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
            cascade_retry_attempts: DEFAULT_CASCADE_RETRY_ATTEMPTS,
            namespace: "blockstore".to_string(),
            database: "blocks".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn turso(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::Turso,
            database_path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn surreal_in_memory() -> Self {
        Self {
            backend: BackendKind::Surreal,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON document; missing fields take defaults
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| format!("Invalid store config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `BLOCKSTORE_*` variables from the process environment
    pub fn with_env_overrides(self) -> Result<Self, String> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn with_overrides<F>(mut self, get: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = get(ENV_BACKEND) {
            self.backend = backend.parse()?;
        }
        if let Some(path) = get(ENV_DB_PATH) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(timeout) = get(ENV_BUSY_TIMEOUT_MS) {
            self.busy_timeout_ms = timeout
                .trim()
                .parse()
                .map_err(|e| format!("Invalid {}: {}", ENV_BUSY_TIMEOUT_MS, e))?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.backend == BackendKind::Turso && self.database_path.is_none() {
            return Err("The turso backend requires database_path".to_string());
        }
        if self.max_tree_depth == 0 {
            return Err("max_tree_depth must be at least 1".to_string());
        }
        if self.cascade_retry_attempts == 0 {
            return Err("cascade_retry_attempts must be at least 1".to_string());
        }
        if self.backend == BackendKind::Surreal
            && (self.namespace.is_empty() || self.database.is_empty())
        {
            return Err("namespace and database names cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Open the configured backend
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn BlockStore>, DatabaseError> {
    config
        .validate()
        .map_err(DatabaseError::initialization_failed)?;

    match config.backend {
        BackendKind::Turso => {
            let path = config.database_path.clone().ok_or_else(|| {
                DatabaseError::initialization_failed("The turso backend requires database_path")
            })?;
            let db = DatabaseService::with_busy_timeout(path, config.busy_timeout_ms).await?;
            tracing::info!(backend = "turso", "Opened block store");
            Ok(Arc::new(TursoStore::new(Arc::new(db))))
        }
        #[cfg(feature = "surrealdb")]
        BackendKind::Surreal => {
            use crate::db::SurrealStore;
            let store = match &config.database_path {
                Some(path) => {
                    SurrealStore::open(path.clone(), &config.namespace, &config.database).await?
                }
                None => SurrealStore::open_in_memory(&config.namespace, &config.database).await?,
            };
            tracing::info!(backend = "surrealdb", "Opened block store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "surrealdb"))]
        BackendKind::Surreal => Err(DatabaseError::initialization_failed(
            "blockstore-core was built without the surrealdb feature",
        )),
    }
}
