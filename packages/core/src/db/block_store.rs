//! BlockStore Trait - Storage Abstraction Layer
//!
//! This module defines the `BlockStore` trait that abstracts persistence of
//! blocks. Business logic lives in the repository; implementations only read
//! rows, translate queries to their native JSON operators, and apply write
//! batches atomically.
//!
//! # Write model
//!
//! Every mutation is expressed as a [`WriteBatch`] of compare-and-swap puts.
//! An insert requires the id to be absent; an update requires the stored
//! version to equal `expected_version`. A backend applies the whole batch in
//! one transaction and fails with [`DatabaseError::WriteConflict`] without
//! writing anything if any precondition does not hold.
//!
//! # Examples
//!
//! ```rust,no_run
//! use blockstore_core::db::{BlockStore, DatabaseService, TursoStore, WriteBatch};
//! use blockstore_core::models::{Block, BlockType};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/blocks.db")).await?);
//!     let store: Arc<dyn BlockStore> = Arc::new(TursoStore::new(db));
//!
//!     let doc = Block::builder(BlockType::Document).workspace("ws").build()?;
//!     let mut batch = WriteBatch::new();
//!     batch.insert(doc.clone());
//!     store.apply(batch).await?;
//!
//!     assert!(store.get_block(&doc.id).await?.is_some());
//!     Ok(())
//! }
//! ```

use crate::db::DatabaseError;
use crate::models::{Block, BlockQuery};
use async_trait::async_trait;

/// One compare-and-swap put
#[derive(Debug, Clone, PartialEq)]
pub enum BlockWrite {
    /// Create a row that must not exist yet
    Insert(Block),
    /// Replace a row whose stored version must equal `expected_version`
    Update { block: Block, expected_version: i64 },
}

impl BlockWrite {
    pub fn block(&self) -> &Block {
        match self {
            Self::Insert(block) => block,
            Self::Update { block, .. } => block,
        }
    }

    pub fn expected_version(&self) -> Option<i64> {
        match self {
            Self::Insert(_) => None,
            Self::Update {
                expected_version, ..
            } => Some(*expected_version),
        }
    }
}

/// Ordered set of puts applied in one transaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<BlockWrite>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, block: Block) {
        self.writes.push(BlockWrite::Insert(block));
    }

    pub fn update(&mut self, block: Block, expected_version: i64) {
        self.writes.push(BlockWrite::Update {
            block,
            expected_version,
        });
    }

    /// Bump `block` and queue it against its current version
    pub fn touch(&mut self, mut block: Block) {
        let expected_version = block.version;
        block.touch();
        self.update(block, expected_version);
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockWrite> {
        self.writes.iter()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.writes.iter().map(BlockWrite::block)
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.writes
            .into_iter()
            .map(|write| match write {
                BlockWrite::Insert(block) => block,
                BlockWrite::Update { block, .. } => block,
            })
            .collect()
    }
}

impl IntoIterator for WriteBatch {
    type Item = BlockWrite;
    type IntoIter = std::vec::IntoIter<BlockWrite>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}

/// Abstraction over block persistence
///
/// Implementations must be `Send + Sync` so a store can be shared behind an
/// `Arc` by concurrent callers. Reads return trashed blocks unless a query
/// says otherwise; visibility is decided by the caller.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Fetch one block by id
    async fn get_block(&self, id: &str) -> Result<Option<Block>, DatabaseError>;

    /// Fetch every listed block that exists, in no particular order
    async fn get_blocks(&self, ids: &[String]) -> Result<Vec<Block>, DatabaseError>;

    /// Fetch every block sharing `root_id`, including the root itself
    async fn get_root_blocks(&self, root_id: &str) -> Result<Vec<Block>, DatabaseError>;

    /// Fetch the direct children of every listed parent
    async fn get_children_of(&self, parent_ids: &[String]) -> Result<Vec<Block>, DatabaseError>;

    /// Run a validated query, returning matches ordered by id
    async fn query_blocks(&self, query: &BlockQuery) -> Result<Vec<Block>, DatabaseError>;

    /// Path of the first `contains` leaf that resolves to a number in scope
    async fn find_numeric_contains(
        &self,
        query: &BlockQuery,
    ) -> Result<Option<String>, DatabaseError>;

    /// Apply a batch atomically, checking every version precondition
    async fn apply(&self, batch: WriteBatch) -> Result<(), DatabaseError>;

    /// Short backend name for logs and parity reports
    fn backend_name(&self) -> &'static str;
}
