//! TursoStore - BlockStore Implementation for Turso/libsql Backend
//!
//! TursoStore wraps a [`DatabaseService`] and delegates row access to its
//! `db_*` methods. Query translation comes from [`sql_filter`](crate::db::sql_filter).
//!
//! # Design Principles
//!
//! 1. **Pure Delegation**: SQL execution and row decoding live in DatabaseService
//! 2. **One round-trip per read**: hydration by root is a single SELECT
//! 3. **Whole-database write lock**: batches run under `BEGIN IMMEDIATE`
//!
//! # Examples
//!
//! ```rust,no_run
//! use blockstore_core::db::{BlockStore, DatabaseService, TursoStore};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/blocks.db")).await?);
//!     let store: Arc<dyn BlockStore> = Arc::new(TursoStore::new(db));
//!     let block = store.get_block("block-123").await?;
//!     Ok(())
//! }
//! ```

use crate::db::block_store::{BlockStore, WriteBatch};
use crate::db::database::BLOCK_COLUMNS;
use crate::db::sql_filter::{numeric_contains_probes, select_query};
use crate::db::{DatabaseError, DatabaseService};
use crate::models::{Block, BlockQuery};
use async_trait::async_trait;
use libsql::Value;
use std::sync::Arc;

/// TursoStore implements BlockStore for the Turso/libsql backend
pub struct TursoStore {
    db: Arc<DatabaseService>,
}

impl TursoStore {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    /// SELECT over `column IN (...)` for a non-empty id list
    async fn select_in(&self, column: &str, ids: &[String]) -> Result<Vec<Block>, DatabaseError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM blocks WHERE {} IN ({})",
            BLOCK_COLUMNS, column, placeholders
        );
        let params = ids.iter().map(|id| Value::Text(id.clone())).collect();
        self.db.db_select_blocks(&sql, params).await
    }
}

#[async_trait]
impl BlockStore for TursoStore {
    async fn get_block(&self, id: &str) -> Result<Option<Block>, DatabaseError> {
        let sql = format!("SELECT {} FROM blocks WHERE id = ?", BLOCK_COLUMNS);
        let mut rows = self
            .db
            .db_select_blocks(&sql, vec![Value::Text(id.to_string())])
            .await?;
        Ok(rows.pop())
    }

    async fn get_blocks(&self, ids: &[String]) -> Result<Vec<Block>, DatabaseError> {
        self.select_in("id", ids).await
    }

    async fn get_root_blocks(&self, root_id: &str) -> Result<Vec<Block>, DatabaseError> {
        let sql = format!("SELECT {} FROM blocks WHERE root_id = ?", BLOCK_COLUMNS);
        self.db
            .db_select_blocks(&sql, vec![Value::Text(root_id.to_string())])
            .await
    }

    async fn get_children_of(&self, parent_ids: &[String]) -> Result<Vec<Block>, DatabaseError> {
        self.select_in("parent_id", parent_ids).await
    }

    async fn query_blocks(&self, query: &BlockQuery) -> Result<Vec<Block>, DatabaseError> {
        let built = select_query(query);
        tracing::debug!(sql = %built.sql, params = built.params.len(), "Running block query");
        self.db.db_select_blocks(&built.sql, built.params).await
    }

    async fn find_numeric_contains(
        &self,
        query: &BlockQuery,
    ) -> Result<Option<String>, DatabaseError> {
        for (path, probe) in numeric_contains_probes(query) {
            if self.db.db_exists(&probe.sql, probe.params).await? {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    async fn apply(&self, batch: WriteBatch) -> Result<(), DatabaseError> {
        self.db.db_apply_batch(batch).await
    }

    fn backend_name(&self) -> &'static str {
        "turso"
    }
}
