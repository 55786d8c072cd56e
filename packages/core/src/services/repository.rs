//! Block Repository
//!
//! The entry point for reading and writing blocks. Every structural write is
//! planned against a fresh snapshot, checked by the [`HierarchyValidator`],
//! and then applied as one compare-and-swap [`WriteBatch`]. Stale versions
//! surface as [`BlockStoreError::Conflict`]; the repository never retries them.

use crate::config::StoreConfig;
use crate::db::{BlockStore, WriteBatch};
use crate::models::{
    Block, BlockGraph, BlockQuery, Depth, FilterError, FilterOperator, INITIAL_VERSION,
};
use crate::operations::{collect_subtree, HierarchyError, HierarchyValidator, Position};
use crate::services::cascade_engine::{CascadeEngine, CascadeOutcome};
use crate::services::BlockStoreError;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Where `upsert_blocks` attaches the incoming blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOptions {
    /// Attach the batch under this existing block
    pub parent_id: Option<String>,
    /// Insert after this child of `parent_id` instead of appending
    pub insert_after: Option<String>,
    /// Attach only blocks whose parent is not in the batch
    pub top_level_only: bool,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self {
            parent_id: None,
            insert_after: None,
            top_level_only: true,
        }
    }
}

impl UpsertOptions {
    pub fn under(parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            ..Self::default()
        }
    }

    pub fn after(mut self, sibling_id: impl Into<String>) -> Self {
        self.insert_after = Some(sibling_id.into());
        self
    }

    /// Attach every block of the batch, not only the top level
    pub fn all_levels(mut self) -> Self {
        self.top_level_only = false;
        self
    }
}

/// Which blocks a hydrated read returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    VisibleOnly,
    IncludeTrashed,
}

impl Visibility {
    fn admits(&self, block: &Block) -> bool {
        match self {
            Self::VisibleOnly => !block.in_trash,
            Self::IncludeTrashed => true,
        }
    }
}

/// Existing blocks modified by one operation, keyed by id
///
/// Each block keeps the version it was read at; committing bumps it and
/// uses the read version as the compare-and-swap precondition.
#[derive(Default)]
struct StagedWrites {
    blocks: BTreeMap<String, Block>,
}

impl StagedWrites {
    fn stage<'a>(
        &'a mut self,
        snapshot: &HashMap<String, Block>,
        id: &str,
    ) -> Result<&'a mut Block, BlockStoreError> {
        match self.blocks.entry(id.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let block = snapshot
                    .get(id)
                    .cloned()
                    .ok_or_else(|| BlockStoreError::not_found(id))?;
                Ok(entry.insert(block))
            }
        }
    }

    fn into_batch(self) -> WriteBatch {
        let mut batch = WriteBatch::new();
        for block in self.blocks.into_values() {
            batch.touch(block);
        }
        batch
    }
}

/// Reads, queries and structural writes over a [`BlockStore`]
pub struct BlockRepository {
    store: Arc<dyn BlockStore>,
    validator: HierarchyValidator,
    cascade: CascadeEngine,
}

impl BlockRepository {
    pub fn new(store: Arc<dyn BlockStore>, config: &StoreConfig) -> Self {
        Self {
            validator: HierarchyValidator::new(config.max_tree_depth),
            cascade: CascadeEngine::new(store.clone(), config),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn BlockStore> {
        &self.store
    }

    pub fn validator(&self) -> &HierarchyValidator {
        &self.validator
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Visible block plus `depth` levels of visible descendants
    pub async fn get_block(&self, id: &str, depth: Depth) -> Result<BlockGraph, BlockStoreError> {
        self.get_block_with(id, depth, Visibility::VisibleOnly).await
    }

    /// Hydrate a block graph
    ///
    /// `Depth::Levels(n)` costs one fetch per level; `Depth::All` is a single
    /// fetch of every block sharing the block's `root_id`.
    pub async fn get_block_with(
        &self,
        id: &str,
        depth: Depth,
        visibility: Visibility,
    ) -> Result<BlockGraph, BlockStoreError> {
        let block = self
            .store
            .get_block(id)
            .await?
            .filter(|b| visibility.admits(b))
            .ok_or_else(|| BlockStoreError::not_found(id))?;

        let descendants = match depth {
            Depth::Levels(levels) => {
                let mut loaded = Vec::new();
                let mut frontier = vec![block.id.clone()];
                for _ in 0..levels {
                    if frontier.is_empty() {
                        break;
                    }
                    let children = self.store.get_children_of(&frontier).await?;
                    frontier.clear();
                    for child in children.into_iter().filter(|c| visibility.admits(c)) {
                        frontier.push(child.id.clone());
                        loaded.push(child);
                    }
                }
                loaded
            }
            Depth::All => {
                let mut tree = self.load_tree(&block.root_id).await?;
                let ids = collect_subtree(&tree, &block.id);
                ids.into_iter()
                    .skip(1)
                    .filter_map(|id| tree.remove(&id))
                    .filter(|b| visibility.admits(b))
                    .collect()
            }
        };

        let graph = BlockGraph::new(block, descendants);
        tracing::debug!(block_id = id, ?depth, loaded = graph.len(), "Hydrated block graph");
        Ok(graph)
    }

    /// Blocks matching `query`, ordered by id
    ///
    /// # Errors
    ///
    /// - `InvalidFilter` for a malformed query
    /// - `UnsupportedOperator` if a `contains` path resolves to a number on
    ///   any block in the query's structural scope
    pub async fn query_blocks(&self, query: &BlockQuery) -> Result<Vec<Block>, BlockStoreError> {
        query.validate()?;
        if let Some(path) = self.store.find_numeric_contains(query).await? {
            return Err(FilterError::UnsupportedOperator {
                operator: FilterOperator::Contains,
                path,
                found: "number".to_string(),
            }
            .into());
        }
        let blocks = self.store.query_blocks(query).await?;
        tracing::debug!(
            backend = self.store.backend_name(),
            count = blocks.len(),
            "Queried blocks"
        );
        Ok(blocks)
    }

    // ========================================================================
    // Structural writes
    // ========================================================================

    /// Persist a batch of new or changed blocks
    ///
    /// Existing blocks must carry their stored version and keep their
    /// `parent_id`, `root_id`, `workspace_id` and `in_trash`. With `options.parent_id`, the top-level
    /// blocks of the batch (or all of them, see [`UpsertOptions::all_levels`])
    /// are attached under that parent and, together with their in-batch
    /// descendants, take over its `root_id` and `workspace_id`.
    ///
    /// Returns the written blocks in batch order, with their new versions.
    pub async fn upsert_blocks(
        &self,
        mut blocks: Vec<Block>,
        options: UpsertOptions,
    ) -> Result<Vec<Block>, BlockStoreError> {
        if blocks.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = blocks.iter().map(|b| b.id.clone()).collect();
        let batch_ids: HashSet<String> = ids.iter().cloned().collect();
        let existing: HashMap<String, Block> = self
            .store
            .get_blocks(&ids)
            .await?
            .into_iter()
            .map(|b| (b.id.clone(), b))
            .collect();

        let mut stored = existing.clone();
        let mut attached_parent: Option<Block> = None;
        if let Some(parent_id) = options.parent_id.as_deref() {
            let parent = match blocks.iter().find(|b| b.id == parent_id) {
                Some(block) => block.clone(),
                None => {
                    let parent = self.require(parent_id).await?;
                    stored.insert(parent.id.clone(), parent.clone());
                    parent
                }
            };
            let previous_children = parent.children_ids.clone();
            let parent = Self::attach(&mut blocks, &batch_ids, parent, &options)?;
            match blocks.iter_mut().find(|b| b.id == parent.id) {
                Some(in_batch) => *in_batch = parent,
                None if parent.children_ids != previous_children => {
                    attached_parent = Some(parent)
                }
                None => {}
            }
        }

        for block in blocks.iter_mut() {
            match existing.get(&block.id) {
                Some(current) if current.version != block.version => {
                    return Err(BlockStoreError::conflict(
                        block.id.clone(),
                        Some(block.version),
                        Some(current.version),
                    ));
                }
                Some(_) => {}
                None => block.version = INITIAL_VERSION,
            }
            block.validate()?;
        }

        let referenced: HashSet<String> = blocks
            .iter()
            .chain(attached_parent.iter())
            .flat_map(|b| b.parent_id.iter().chain(b.children_ids.iter()))
            .chain(existing.values().flat_map(|b| b.children_ids.iter()))
            .filter(|id| !batch_ids.contains(*id) && !stored.contains_key(*id))
            .cloned()
            .collect();
        let referenced: Vec<String> = referenced.into_iter().collect();
        for block in self.store.get_blocks(&referenced).await? {
            stored.insert(block.id.clone(), block);
        }

        let mut checked = blocks.clone();
        checked.extend(attached_parent.iter().cloned());
        self.validator.validate_batch(&checked, &stored)?;

        let mut batch = WriteBatch::new();
        for block in blocks {
            if existing.contains_key(&block.id) {
                batch.touch(block);
            } else {
                batch.insert(block);
            }
        }
        if let Some(parent) = attached_parent {
            batch.touch(parent);
        }

        let written: Vec<Block> = batch
            .blocks()
            .filter(|b| batch_ids.contains(&b.id))
            .cloned()
            .collect();
        let count = batch.len();
        self.store.apply(batch).await?;
        tracing::info!(count, parent_id = ?options.parent_id, "Upserted blocks");
        Ok(written)
    }

    /// Point the attachable blocks at `parent` and list them in its children
    fn attach(
        blocks: &mut [Block],
        batch_ids: &HashSet<String>,
        mut parent: Block,
        options: &UpsertOptions,
    ) -> Result<Block, BlockStoreError> {
        let attached: Vec<usize> = blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.id != parent.id)
            .filter(|(_, b)| {
                !options.top_level_only
                    || b.parent_id.as_deref().map_or(true, |p| !batch_ids.contains(p))
            })
            .map(|(i, _)| i)
            .collect();

        let index: HashMap<String, usize> = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.id.clone(), i))
            .collect();
        let mut queue: VecDeque<usize> = attached.iter().copied().collect();
        let mut seen = HashSet::new();
        while let Some(i) = queue.pop_front() {
            if !seen.insert(i) {
                continue;
            }
            let block = &mut blocks[i];
            block.root_id = parent.root_id.clone();
            block.workspace_id = parent.workspace_id.clone();
            for child_id in &block.children_ids {
                if let Some(&j) = index.get(child_id) {
                    queue.push_back(j);
                }
            }
        }

        let mut new_children = Vec::new();
        for &i in &attached {
            let block = &mut blocks[i];
            block.parent_id = Some(parent.id.clone());
            if !parent.children_ids.contains(&block.id) {
                new_children.push(block.id.clone());
            }
        }

        let at = match options.insert_after.as_deref() {
            Some(anchor_id) => {
                parent
                    .children_ids
                    .iter()
                    .position(|id| id == anchor_id)
                    .ok_or_else(|| HierarchyError::AnchorNotFound {
                        parent_id: parent.id.clone(),
                        anchor_id: anchor_id.to_string(),
                    })?
                    + 1
            }
            None => parent.children_ids.len(),
        };
        parent.children_ids.splice(at..at, new_children);
        Ok(parent)
    }

    /// Replace the children list of `parent_id`
    ///
    /// New ids are adopted from their current parent, which must be in the
    /// same root. Every current child must stay listed.
    pub async fn set_children(
        &self,
        parent_id: &str,
        children: Vec<String>,
        expected_version: i64,
    ) -> Result<Block, BlockStoreError> {
        let mut snapshot = self.load_tree_of(parent_id).await?;
        let foreign: Vec<String> = children
            .iter()
            .filter(|id| !snapshot.contains_key(*id))
            .cloned()
            .collect();
        for block in self.store.get_blocks(&foreign).await? {
            snapshot.insert(block.id.clone(), block);
        }

        let parent = snapshot
            .get(parent_id)
            .ok_or_else(|| BlockStoreError::not_found(parent_id))?;
        let plan =
            self.validator
                .validate_set_children(&snapshot, parent, &children, expected_version)?;

        let mut staged = StagedWrites::default();
        staged.stage(&snapshot, parent_id)?.children_ids = plan.children;
        for adoption in &plan.adopted {
            if let Some(previous) = adoption.previous_parent.as_deref() {
                if previous != parent_id {
                    staged
                        .stage(&snapshot, previous)?
                        .children_ids
                        .retain(|id| id != &adoption.child_id);
                }
            }
            staged.stage(&snapshot, &adoption.child_id)?.parent_id = Some(parent_id.to_string());
        }

        self.commit(staged, parent_id).await
    }

    /// Reorder the children of `parent_id` without changing membership
    pub async fn reorder_children(
        &self,
        parent_id: &str,
        children: Vec<String>,
        expected_version: i64,
    ) -> Result<Block, BlockStoreError> {
        let parent = self.require(parent_id).await?;
        let ordered = self
            .validator
            .validate_reorder(&parent, &children, expected_version)?;

        let snapshot = HashMap::from([(parent.id.clone(), parent)]);
        let mut staged = StagedWrites::default();
        staged.stage(&snapshot, parent_id)?.children_ids = ordered;
        self.commit(staged, parent_id).await
    }

    /// Move `block_id` under `new_parent_id` at `position`
    ///
    /// `expected_version` is the version of the moved block. Both parents'
    /// children lists and the block itself are written in one batch.
    pub async fn move_block(
        &self,
        block_id: &str,
        new_parent_id: &str,
        position: Position,
        expected_version: i64,
    ) -> Result<Block, BlockStoreError> {
        let mut snapshot = self.load_tree_of(block_id).await?;
        if !snapshot.contains_key(new_parent_id) {
            let new_parent = self.require(new_parent_id).await?;
            snapshot.insert(new_parent.id.clone(), new_parent);
        }

        let block = snapshot
            .get(block_id)
            .ok_or_else(|| BlockStoreError::not_found(block_id))?;
        if block.version != expected_version {
            return Err(BlockStoreError::conflict(
                block_id,
                Some(expected_version),
                Some(block.version),
            ));
        }
        let new_parent = snapshot
            .get(new_parent_id)
            .ok_or_else(|| BlockStoreError::not_found(new_parent_id))?;
        let plan = self
            .validator
            .validate_move(&snapshot, block, new_parent, &position)?;

        let mut staged = StagedWrites::default();
        staged.stage(&snapshot, new_parent_id)?.children_ids = plan.new_parent_children;
        if let Some((old_parent_id, remaining)) = plan.old_parent {
            staged.stage(&snapshot, &old_parent_id)?.children_ids = remaining;
        }
        staged.stage(&snapshot, block_id)?.parent_id = Some(new_parent_id.to_string());

        self.commit(staged, block_id).await
    }

    // ========================================================================
    // Trash
    // ========================================================================

    /// Trash a block and its whole subtree
    pub async fn delete_block(&self, id: &str) -> Result<CascadeOutcome, BlockStoreError> {
        self.cascade.set_in_trash(&[id.to_string()], true, true).await
    }

    /// Restore a block and its whole subtree
    pub async fn restore_block(&self, id: &str) -> Result<CascadeOutcome, BlockStoreError> {
        self.cascade.set_in_trash(&[id.to_string()], false, true).await
    }

    /// Trash or restore several blocks in one transaction
    pub async fn set_in_trash(
        &self,
        ids: &[String],
        in_trash: bool,
        cascade: bool,
    ) -> Result<CascadeOutcome, BlockStoreError> {
        self.cascade.set_in_trash(ids, in_trash, cascade).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn require(&self, id: &str) -> Result<Block, BlockStoreError> {
        self.store
            .get_block(id)
            .await?
            .ok_or_else(|| BlockStoreError::not_found(id))
    }

    async fn load_tree(&self, root_id: &str) -> Result<HashMap<String, Block>, BlockStoreError> {
        Ok(self
            .store
            .get_root_blocks(root_id)
            .await?
            .into_iter()
            .map(|b| (b.id.clone(), b))
            .collect())
    }

    /// Every block in the tree containing `id`
    async fn load_tree_of(&self, id: &str) -> Result<HashMap<String, Block>, BlockStoreError> {
        let block = self.require(id).await?;
        let mut tree = self.load_tree(&block.root_id).await?;
        tree.entry(block.id.clone()).or_insert(block);
        Ok(tree)
    }

    async fn commit(&self, staged: StagedWrites, result_id: &str) -> Result<Block, BlockStoreError> {
        let batch = staged.into_batch();
        let result = batch
            .blocks()
            .find(|b| b.id == result_id)
            .cloned()
            .ok_or_else(|| BlockStoreError::not_found(result_id))?;
        let count = batch.len();
        self.store.apply(batch).await?;
        tracing::debug!(block_id = result_id, count, "Committed hierarchy change");
        Ok(result)
    }
}
