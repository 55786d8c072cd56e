//! Document Store
//!
//! Document-oriented façade over [`BlockRepository`] and
//! [`GroupingResolver`]: whole-document reads, document listing, page views
//! and structural writes that read the current version themselves.

use crate::config::StoreConfig;
use crate::db::BlockStore;
use crate::models::{Block, BlockGraph, BlockQuery, BlockType, Depth, WhereClause};
use crate::operations::Position;
use crate::services::{BlockRepository, BlockStoreError, GroupScope, GroupingResolver};
use std::sync::Arc;

/// One group anchor and the blocks tagged with it, in canonical order
#[derive(Debug, Clone, PartialEq)]
pub struct GroupView {
    pub anchor: Block,
    pub blocks: Vec<Block>,
}

pub struct DocumentStore {
    repository: BlockRepository,
    grouping: GroupingResolver,
}

impl DocumentStore {
    pub fn new(store: Arc<dyn BlockStore>, config: &StoreConfig) -> Self {
        Self {
            repository: BlockRepository::new(store.clone(), config),
            grouping: GroupingResolver::new(store, config),
        }
    }

    pub fn repository(&self) -> &BlockRepository {
        &self.repository
    }

    pub fn grouping(&self) -> &GroupingResolver {
        &self.grouping
    }

    /// The full visible tree of a document
    pub async fn get_root_tree(&self, document_id: &str) -> Result<BlockGraph, BlockStoreError> {
        let graph = self.repository.get_block(document_id, Depth::All).await?;
        let block_type = graph.block().block_type();
        if block_type != BlockType::Document {
            return Err(BlockStoreError::not_a_document(document_id, block_type.as_str()));
        }
        Ok(graph)
    }

    /// Visible documents ordered by id
    pub async fn list_documents(&self, limit: Option<usize>) -> Result<Vec<Block>, BlockStoreError> {
        let mut query = BlockQuery::new(WhereClause::new().block_type(BlockType::Document));
        query.limit = limit;
        self.repository.query_blocks(&query).await
    }

    /// Every group anchor under a group index, in index order, with its blocks
    pub async fn page_groups(&self, index_id: &str) -> Result<Vec<GroupView>, BlockStoreError> {
        let index = self.repository.get_block(index_id, Depth::CHILDREN).await?;
        let root_id = index.block().root_id.clone();

        let mut views = Vec::new();
        for anchor in index.children_of(index.block()) {
            if !anchor.block_type().is_group_anchor() {
                continue;
            }
            let blocks = self
                .grouping
                .resolve_group(&anchor.id, GroupScope::root(root_id.clone()))
                .await?;
            views.push(GroupView {
                anchor: anchor.clone(),
                blocks,
            });
        }
        tracing::debug!(index_id, groups = views.len(), "Resolved page groups");
        Ok(views)
    }

    /// `set_children` against the version read just before the write
    pub async fn set_children(
        &self,
        parent_id: &str,
        children: Vec<String>,
    ) -> Result<Block, BlockStoreError> {
        let parent = self.repository.get_block(parent_id, Depth::BLOCK).await?;
        let version = parent.block().version;
        self.repository.set_children(parent_id, children, version).await
    }

    /// `move_block` against the version read just before the write
    pub async fn move_block(
        &self,
        block_id: &str,
        new_parent_id: &str,
        position: Position,
    ) -> Result<Block, BlockStoreError> {
        let block = self.repository.get_block(block_id, Depth::BLOCK).await?;
        let version = block.block().version;
        self.repository
            .move_block(block_id, new_parent_id, position, version)
            .await
    }
}
