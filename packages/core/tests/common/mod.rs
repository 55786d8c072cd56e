//! Shared fixtures for integration tests
//!
//! Every scenario runs against each compiled backend: a libsql file in a
//! temporary directory and, with the `surrealdb` feature, an in-memory
//! SurrealDB.

#![allow(dead_code)]

use blockstore_core::db::{BlockStore, DatabaseService, TursoStore};
use blockstore_core::models::{Block, BlockType, GroupIndexKind};
use blockstore_core::{DocumentStore, StoreConfig, UpsertOptions};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

pub const WORKSPACE: &str = "ws";

/// A store plus whatever keeps it alive
pub struct Backend {
    pub name: &'static str,
    pub store: Arc<dyn BlockStore>,
    _temp_dir: Option<TempDir>,
}

pub async fn turso_backend() -> Backend {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("blocks.db");
    let db = Arc::new(DatabaseService::new(db_path).await.unwrap());
    Backend {
        name: "turso",
        store: Arc::new(TursoStore::new(db)),
        _temp_dir: Some(temp_dir),
    }
}

#[cfg(feature = "surrealdb")]
pub async fn surreal_backend() -> Backend {
    use blockstore_core::db::SurrealStore;
    Backend {
        name: "surrealdb",
        store: Arc::new(SurrealStore::new_in_memory().await.unwrap()),
        _temp_dir: None,
    }
}

pub async fn backends() -> Vec<Backend> {
    #[allow(unused_mut)]
    let mut backends = vec![turso_backend().await];
    #[cfg(feature = "surrealdb")]
    backends.push(surreal_backend().await);
    backends
}

pub fn config() -> StoreConfig {
    StoreConfig::default()
}

fn child(block_type: BlockType, id: &str, parent: &str) -> blockstore_core::BlockBuilder {
    Block::builder(block_type)
        .id(id)
        .workspace(WORKSPACE)
        .root("doc")
        .parent(parent)
}

/// `doc → [index, list]`, `index → [page-1, page-2]`, `list → [item-1..item-4]`
///
/// Items 1-2 are tagged `page-1`, items 3-4 are tagged `page-2`.
pub fn secondary_tree() -> Vec<Block> {
    let mut blocks = vec![
        Block::builder(BlockType::Document)
            .id("doc")
            .workspace(WORKSPACE)
            .property("title", json!("Report"))
            .children(["index", "list"])
            .build()
            .unwrap(),
        child(BlockType::GroupIndex, "index", "doc")
            .property("group_index_type", json!(GroupIndexKind::Page.as_str()))
            .children(["page-1", "page-2"])
            .build()
            .unwrap(),
        child(BlockType::PageGroup, "page-1", "index")
            .property("page_number", json!(1))
            .build()
            .unwrap(),
        child(BlockType::PageGroup, "page-2", "index")
            .property("page_number", json!(2))
            .build()
            .unwrap(),
        child(BlockType::Paragraph, "list", "doc")
            .plain_text("Findings")
            .children(["item-1", "item-2", "item-3", "item-4"])
            .build()
            .unwrap(),
    ];
    for n in 1..=4 {
        let page = if n <= 2 { "page-1" } else { "page-2" };
        blocks.push(
            child(BlockType::Paragraph, &format!("item-{}", n), "list")
                .plain_text(format!("Finding {}", n))
                .property("rank", json!(n))
                .groups([page])
                .build()
                .unwrap(),
        );
    }
    blocks
}

/// A paragraph to attach under an existing block
pub fn paragraph(id: &str, text: &str) -> Block {
    Block::builder(BlockType::Paragraph)
        .id(id)
        .workspace(WORKSPACE)
        .plain_text(text)
        .build()
        .unwrap()
}

/// Document store over `backend`, seeded with [`secondary_tree`]
pub async fn seeded(backend: &Backend) -> DocumentStore {
    let documents = DocumentStore::new(backend.store.clone(), &config());
    documents
        .repository()
        .upsert_blocks(secondary_tree(), UpsertOptions::default())
        .await
        .unwrap();
    documents
}

pub fn ids(blocks: &[Block]) -> Vec<&str> {
    blocks.iter().map(|b| b.id.as_str()).collect()
}
