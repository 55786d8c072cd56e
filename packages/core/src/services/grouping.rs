//! Grouping Resolver
//!
//! Groups are secondary views over the canonical tree: a block joins a group
//! by listing the anchor id in `properties.groups`. Resolving a group fetches
//! the tagged blocks and puts them back in canonical reading order, as if the
//! tree were walked depth-first and only tagged blocks kept.
//!
//! Tags naming an anchor that no longer exists are not an error; the group is
//! simply empty.

use crate::config::StoreConfig;
use crate::db::BlockStore;
use crate::models::{Block, BlockGraph, BlockQuery, BlockType, FilterExpression, WhereClause};
use crate::operations::{sort_canonical as canonical_order, FilterEngine};
use crate::services::BlockStoreError;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Structural bounds of a group query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupScope {
    pub workspace_id: Option<String>,
    pub root_id: Option<String>,
    /// Empty means every type
    pub block_types: Vec<BlockType>,
}

impl GroupScope {
    pub fn workspace(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: Some(workspace_id.into()),
            ..Self::default()
        }
    }

    pub fn root(root_id: impl Into<String>) -> Self {
        Self {
            root_id: Some(root_id.into()),
            ..Self::default()
        }
    }

    pub fn with_types(mut self, block_types: impl IntoIterator<Item = BlockType>) -> Self {
        self.block_types = block_types.into_iter().collect();
        self
    }

    fn where_clause(&self) -> WhereClause {
        let mut clause = WhereClause::new();
        if let Some(workspace_id) = &self.workspace_id {
            clause = clause.workspace(workspace_id.clone());
        }
        if let Some(root_id) = &self.root_id {
            clause = clause.root(root_id.clone());
        }
        if !self.block_types.is_empty() {
            clause = clause.block_types(self.block_types.iter().copied());
        }
        clause
    }
}

pub struct GroupingResolver {
    store: Arc<dyn BlockStore>,
    engine: FilterEngine,
    max_depth: usize,
}

impl GroupingResolver {
    pub fn new(store: Arc<dyn BlockStore>, config: &StoreConfig) -> Self {
        Self {
            store,
            engine: FilterEngine::new(),
            max_depth: config.max_tree_depth,
        }
    }

    /// Visible blocks tagged with `group`, in canonical order
    pub async fn resolve_group(
        &self,
        group: &str,
        scope: GroupScope,
    ) -> Result<Vec<Block>, BlockStoreError> {
        let query = BlockQuery::new(scope.where_clause()).with_filter(FilterExpression::in_group(group));
        let tagged = self.store.query_blocks(&query).await?;
        let ordered = self.sort_canonical(tagged).await?;
        tracing::debug!(group, count = ordered.len(), "Resolved group");
        Ok(ordered)
    }

    /// Sort blocks into canonical tree order
    ///
    /// Loads the tree of every root involved once. Blocks whose chain cannot
    /// be resolved go last, by id; multiple roots are ordered by root id.
    pub async fn sort_canonical(&self, blocks: Vec<Block>) -> Result<Vec<Block>, BlockStoreError> {
        if blocks.len() < 2 {
            return Ok(blocks);
        }
        let roots: BTreeSet<&str> = blocks.iter().map(|b| b.root_id.as_str()).collect();
        let mut snapshot: HashMap<String, Block> = HashMap::new();
        for root_id in roots {
            for block in self.store.get_root_blocks(root_id).await? {
                snapshot.insert(block.id.clone(), block);
            }
        }
        Ok(canonical_order(&snapshot, blocks, self.max_depth))
    }

    /// Resolve a group inside an already hydrated graph, without storage access
    pub fn resolve_in_graph(
        &self,
        graph: &BlockGraph,
        group: &str,
    ) -> Result<Vec<Block>, BlockStoreError> {
        let query = BlockQuery::default().with_filter(FilterExpression::in_group(group));
        let tagged: Vec<Block> = self
            .engine
            .filter(&query, graph.blocks())?
            .into_iter()
            .cloned()
            .collect();
        Ok(canonical_order(graph, tagged, self.max_depth))
    }
}
