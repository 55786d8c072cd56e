//! Storage errors shared by both backends

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Cannot open block store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    #[error("Block store path is not writable: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Cannot create block store directory: {0}")]
    CreateDirectory(#[from] std::io::Error),

    /// Schema setup or configuration rejected at open time
    #[error("Block store initialization failed: {0}")]
    InitializationFailed(String),

    #[error("libsql: {0}")]
    Driver(#[from] libsql::Error),

    #[error("Statement failed: {context}")]
    Statement { context: String },

    /// A stored row could not be decoded into a block
    #[error("Invalid stored row: {0}")]
    InvalidRow(String),

    /// A write precondition failed: the row was missing, already present, or at another version
    #[error("Write conflict on '{block_id}': expected version {expected_version:?}, found {actual_version:?}")]
    WriteConflict {
        block_id: String,
        expected_version: Option<i64>,
        actual_version: Option<i64>,
    },

    #[error("SurrealDB: {0:#}")]
    Embedded(#[from] anyhow::Error),
}

impl DatabaseError {
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::OpenFailed { path, source }
    }

    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    pub fn permission_denied(path: PathBuf) -> Self {
        Self::PermissionDenied { path }
    }

    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::Statement {
            context: context.into(),
        }
    }

    pub fn invalid_row(msg: impl Into<String>) -> Self {
        Self::InvalidRow(msg.into())
    }

    pub fn write_conflict(
        block_id: impl Into<String>,
        expected_version: Option<i64>,
        actual_version: Option<i64>,
    ) -> Self {
        Self::WriteConflict {
            block_id: block_id.into(),
            expected_version,
            actual_version,
        }
    }

    /// Whether retrying the whole operation may succeed
    ///
    /// Conflicts and undecodable rows are deterministic and never retried.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            Self::WriteConflict { .. } | Self::InvalidRow(_) | Self::PermissionDenied { .. }
        )
    }
}
