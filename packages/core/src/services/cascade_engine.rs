//! Cascading Soft-Delete
//!
//! Trash and restore flip `in_trash` on a block and, when cascading, on its
//! whole subtree in one batched write. Every read path can then treat
//! visibility as a flat `in_trash = false` predicate.
//!
//! A storage failure retries the whole operation from a fresh read, up to
//! `StoreConfig::cascade_retry_attempts` times. Version conflicts are
//! surfaced immediately.

use crate::config::StoreConfig;
use crate::db::{BlockStore, WriteBatch};
use crate::models::Block;
use crate::operations::plan_trash;
use crate::services::BlockStoreError;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Blocks whose flag a cascade changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeOutcome {
    /// Changed ids, breadth-first per target
    pub changed_ids: Vec<String>,
    /// Attempts it took, starting at 1
    pub attempts: u32,
}

impl CascadeOutcome {
    pub fn len(&self) -> usize {
        self.changed_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changed_ids.is_empty()
    }
}

pub struct CascadeEngine {
    store: Arc<dyn BlockStore>,
    retry_attempts: u32,
}

impl CascadeEngine {
    pub fn new(store: Arc<dyn BlockStore>, config: &StoreConfig) -> Self {
        Self {
            store,
            retry_attempts: config.cascade_retry_attempts.max(1),
        }
    }

    /// Trash or restore `targets`, with or without their descendants
    ///
    /// # Errors
    ///
    /// - `NotFound` if a target does not exist
    /// - `InvalidHierarchy` if a restore would put a block under a trashed
    ///   parent, or a non-cascading trash would leave visible children behind
    /// - `Conflict` if a concurrent writer changed one of the blocks
    pub async fn set_in_trash(
        &self,
        targets: &[String],
        in_trash: bool,
        cascade: bool,
    ) -> Result<CascadeOutcome, BlockStoreError> {
        if targets.is_empty() {
            return Ok(CascadeOutcome::default());
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.apply_once(targets, in_trash, cascade).await {
                Ok(changed_ids) => {
                    tracing::info!(
                        targets = targets.len(),
                        count = changed_ids.len(),
                        in_trash,
                        attempts = attempt,
                        "Applied trash cascade"
                    );
                    return Ok(CascadeOutcome {
                        changed_ids,
                        attempts: attempt,
                    });
                }
                Err(e) if e.is_transient() && attempt < self.retry_attempts => {
                    tracing::warn!(attempt, error = %e, "Trash cascade failed, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn apply_once(
        &self,
        targets: &[String],
        in_trash: bool,
        cascade: bool,
    ) -> Result<Vec<String>, BlockStoreError> {
        let found = self.store.get_blocks(targets).await?;
        if let Some(missing) = targets.iter().find(|id| !found.iter().any(|b| &b.id == *id)) {
            return Err(BlockStoreError::not_found(missing.clone()));
        }

        let roots: BTreeSet<&str> = found.iter().map(|b| b.root_id.as_str()).collect();
        let mut snapshot: HashMap<String, Block> = HashMap::new();
        for root_id in roots {
            for block in self.store.get_root_blocks(root_id).await? {
                snapshot.insert(block.id.clone(), block);
            }
        }

        let plan = plan_trash(&snapshot, targets, in_trash, cascade)?;
        if plan.is_empty() {
            return Ok(Vec::new());
        }

        let changed_ids: Vec<String> = plan.ids().into_iter().map(String::from).collect();
        let mut batch = WriteBatch::new();
        for mut block in plan.blocks {
            block.in_trash = in_trash;
            batch.touch(block);
        }
        self.store.apply(batch).await?;
        Ok(changed_ids)
    }
}
