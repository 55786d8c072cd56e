//! Seed Example Binary
//!
//! Seeds a small document whose list items are split across two page groups
//! and prints each page in canonical order.
//!
//! # Usage
//!
//! ```bash
//! # In-memory SurrealDB
//! cargo run --bin seed-example
//!
//! # libsql file
//! BLOCKSTORE_BACKEND=turso BLOCKSTORE_DB_PATH=/tmp/blocks.db cargo run --bin seed-example
//! ```
//!
//! # Environment Variables
//!
//! - `BLOCKSTORE_BACKEND`, `BLOCKSTORE_DB_PATH`, `BLOCKSTORE_BUSY_TIMEOUT_MS`
//! - `RUST_LOG`: Logging level (default: "info")

use anyhow::Context;
use blockstore_core::models::{Block, BlockType, GroupIndexKind};
use blockstore_core::{open_store, DocumentStore, StoreConfig, UpsertOptions};
use serde_json::json;

const WORKSPACE: &str = "demo-workspace";

fn fixture() -> Result<Vec<Block>, blockstore_core::ValidationError> {
    let child = |block_type: BlockType, id: &str, parent: &str| {
        Block::builder(block_type)
            .id(id)
            .workspace(WORKSPACE)
            .root("doc")
            .parent(parent)
    };

    let mut blocks = vec![
        Block::builder(BlockType::Document)
            .id("doc")
            .workspace(WORKSPACE)
            .property("title", json!("Quarterly report"))
            .children(["index", "list"])
            .build()?,
        child(BlockType::GroupIndex, "index", "doc")
            .property("group_index_type", json!(GroupIndexKind::Page.as_str()))
            .children(["page-1", "page-2"])
            .build()?,
        child(BlockType::PageGroup, "page-1", "index")
            .property("page_number", json!(1))
            .build()?,
        child(BlockType::PageGroup, "page-2", "index")
            .property("page_number", json!(2))
            .build()?,
        child(BlockType::Paragraph, "list", "doc")
            .plain_text("Findings")
            .children(["item-1", "item-2", "item-3", "item-4"])
            .build()?,
    ];
    for n in 1..=4 {
        let page = if n <= 2 { "page-1" } else { "page-2" };
        blocks.push(
            child(BlockType::Paragraph, &format!("item-{}", n), "list")
                .plain_text(format!("Finding {}", n))
                .groups([page])
                .build()?,
        );
    }
    Ok(blocks)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = StoreConfig::surreal_in_memory()
        .with_env_overrides()
        .map_err(anyhow::Error::msg)?;
    tracing::info!(backend = ?config.backend, "Seeding example document");

    let store = open_store(&config).await.context("Failed to open block store")?;
    let documents = DocumentStore::new(store, &config);

    let written = documents
        .repository()
        .upsert_blocks(fixture()?, UpsertOptions::default())
        .await?;
    tracing::info!(count = written.len(), "Seeded blocks");

    for view in documents.page_groups("index").await? {
        let ids: Vec<&str> = view.blocks.iter().map(|b| b.id.as_str()).collect();
        println!("{}: {}", view.anchor.id, ids.join(", "));
    }

    Ok(())
}
