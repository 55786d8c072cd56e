//! Integration tests for BlockRepository
//!
//! Tests cover:
//! - Depth-controlled hydration
//! - set_children / reorder_children / move_block validation and versioning
//! - Upsert attach semantics and version checks
//! - Query filters, including numeric `contains` rejection
//! - Tree invariants after a sequence of structural writes

mod common;

use blockstore_core::models::{
    BlockQuery, BlockType, Depth, FilterExpression, PropertyFilter, RelatedFilter, WhereClause,
};
use blockstore_core::operations::{HierarchyError, Position};
use blockstore_core::{BlockStoreError, UpsertOptions, Visibility};
use common::{backends, ids, paragraph, seeded};
use serde_json::json;
use std::collections::HashMap;

// =========================================================================
// Hydration
// =========================================================================

#[tokio::test]
async fn test_get_block_depths() {
    for backend in backends().await {
        let docs = seeded(&backend).await;
        let repo = docs.repository();

        let block = repo.get_block("doc", Depth::BLOCK).await.unwrap();
        assert_eq!(block.len(), 1, "{}", backend.name);

        let children = repo.get_block("doc", Depth::CHILDREN).await.unwrap();
        assert_eq!(children.len(), 3, "{}", backend.name);
        assert_eq!(
            children
                .children("doc")
                .iter()
                .map(|b| b.id.as_str())
                .collect::<Vec<_>>(),
            vec!["index", "list"]
        );

        let two = repo.get_block("doc", Depth::Levels(2)).await.unwrap();
        assert_eq!(two.len(), 9, "{}", backend.name);

        let all = repo.get_block("doc", Depth::All).await.unwrap();
        assert_eq!(all.len(), 9, "{}", backend.name);

        let subtree = repo.get_block("list", Depth::All).await.unwrap();
        assert_eq!(subtree.len(), 5, "{}", backend.name);
        assert!(!subtree.contains("index"));
        assert_eq!(
            subtree
                .pre_order()
                .iter()
                .map(|b| b.id.as_str())
                .collect::<Vec<_>>(),
            vec!["list", "item-1", "item-2", "item-3", "item-4"]
        );
    }
}

#[tokio::test]
async fn test_get_missing_block_is_not_found() {
    for backend in backends().await {
        let docs = seeded(&backend).await;
        let err = docs
            .repository()
            .get_block("nope", Depth::BLOCK)
            .await
            .unwrap_err();
        assert!(matches!(err, BlockStoreError::NotFound { .. }), "{}", backend.name);
    }
}

// =========================================================================
// set_children / reorder_children
// =========================================================================

#[tokio::test]
async fn test_stale_set_children_conflicts_and_leaves_state_unchanged() {
    for backend in backends().await {
        let docs = seeded(&backend).await;
        let repo = docs.repository();

        let reversed: Vec<String> = ["item-4", "item-3", "item-2", "item-1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let updated = repo.set_children("list", reversed.clone(), 1).await.unwrap();
        assert_eq!(updated.version, 2);

        let original: Vec<String> = ["item-1", "item-2", "item-3", "item-4"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let err = repo.set_children("list", original, 1).await.unwrap_err();
        assert!(
            matches!(
                err,
                BlockStoreError::Conflict {
                    expected_version: Some(1),
                    actual_version: Some(2),
                    ..
                }
            ),
            "{}: {:?}",
            backend.name,
            err
        );

        let list = repo.get_block("list", Depth::BLOCK).await.unwrap();
        assert_eq!(list.block().children_ids, reversed);
        assert_eq!(list.block().version, 2);
    }
}

#[tokio::test]
async fn test_set_children_adopts_from_sibling_parent() {
    for backend in backends().await {
        let docs = seeded(&backend).await;
        let repo = docs.repository();

        // Move item-4 under doc first, then take it back through set_children
        repo.move_block("item-4", "doc", Position::End, 1).await.unwrap();

        let list = repo.get_block("list", Depth::BLOCK).await.unwrap();
        let version = list.block().version;
        let children: Vec<String> = ["item-4", "item-1", "item-2", "item-3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        repo.set_children("list", children.clone(), version).await.unwrap();

        let doc = repo.get_block("doc", Depth::BLOCK).await.unwrap();
        assert_eq!(doc.block().children_ids, vec!["index", "list"]);
        let item = repo.get_block("item-4", Depth::BLOCK).await.unwrap();
        assert_eq!(item.block().parent_id.as_deref(), Some("list"));
        let list = repo.get_block("list", Depth::BLOCK).await.unwrap();
        assert_eq!(list.block().children_ids, children, "{}", backend.name);
    }
}

#[tokio::test]
async fn test_set_children_rejects_orphaning_and_duplicates() {
    for backend in backends().await {
        let docs = seeded(&backend).await;
        let repo = docs.repository();

        let dropped = vec!["item-1".to_string(), "item-2".to_string()];
        let err = repo.set_children("list", dropped, 1).await.unwrap_err();
        assert!(matches!(err, BlockStoreError::InvalidHierarchy(_)), "{}", backend.name);

        let duplicated = vec![
            "item-1".to_string(),
            "item-1".to_string(),
            "item-2".to_string(),
            "item-3".to_string(),
            "item-4".to_string(),
        ];
        let err = repo.set_children("list", duplicated, 1).await.unwrap_err();
        assert!(matches!(err, BlockStoreError::InvalidHierarchy(_)), "{}", backend.name);
    }
}

#[tokio::test]
async fn test_reorder_children_keeps_membership() {
    for backend in backends().await {
        let docs = seeded(&backend).await;
        let repo = docs.repository();

        let reordered = vec!["list".to_string(), "index".to_string()];
        let doc = repo.reorder_children("doc", reordered.clone(), 1).await.unwrap();
        assert_eq!(doc.children_ids, reordered);

        let err = repo
            .reorder_children("doc", vec!["list".to_string()], 2)
            .await
            .unwrap_err();
        assert!(matches!(err, BlockStoreError::InvalidHierarchy(_)), "{}", backend.name);
    }
}

// =========================================================================
// move_block
// =========================================================================

#[tokio::test]
async fn test_move_under_itself_is_invalid_hierarchy() {
    for backend in backends().await {
        let docs = seeded(&backend).await;
        let repo = docs.repository();

        let err = repo
            .move_block("item-2", "item-2", Position::End, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, BlockStoreError::InvalidHierarchy(_)), "{}", backend.name);

        let err = repo
            .move_block("list", "item-1", Position::End, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, BlockStoreError::InvalidHierarchy(_)), "{}", backend.name);

        let err = repo
            .move_block("doc", "list", Position::End, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, BlockStoreError::InvalidHierarchy(_)), "{}", backend.name);
    }
}

#[tokio::test]
async fn test_move_inserts_after_anchor() {
    for backend in backends().await {
        let docs = seeded(&backend).await;
        let repo = docs.repository();

        let moved = repo
            .move_block("item-4", "list", Position::After("item-1".to_string()), 1)
            .await
            .unwrap();
        assert_eq!(moved.version, 2);

        let list = repo.get_block("list", Depth::BLOCK).await.unwrap();
        assert_eq!(
            list.block().children_ids,
            vec!["item-1", "item-4", "item-2", "item-3"],
            "{}",
            backend.name
        );
    }
}

#[tokio::test]
async fn test_move_across_parents_updates_both_lists() {
    for backend in backends().await {
        let docs = seeded(&backend).await;
        let repo = docs.repository();

        repo.move_block("item-3", "doc", Position::Index(1), 1)
            .await
            .unwrap();

        let doc = repo.get_block("doc", Depth::CHILDREN).await.unwrap();
        assert_eq!(doc.block().children_ids, vec!["index", "item-3", "list"]);
        assert_eq!(doc.block().version, 2);
        let list = repo.get_block("list", Depth::BLOCK).await.unwrap();
        assert_eq!(list.block().children_ids, vec!["item-1", "item-2", "item-4"]);
        assert_eq!(list.block().version, 2);

        let err = repo
            .move_block("item-3", "list", Position::End, 1)
            .await
            .unwrap_err();
        assert!(err.is_conflict(), "{}", backend.name);
    }
}

// =========================================================================
// upsert_blocks
// =========================================================================

#[tokio::test]
async fn test_upsert_attaches_after_anchor() {
    for backend in backends().await {
        let docs = seeded(&backend).await;
        let repo = docs.repository();

        let written = repo
            .upsert_blocks(
                vec![paragraph("note", "A note")],
                UpsertOptions::under("list").after("item-2"),
            )
            .await
            .unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].root_id, "doc");
        assert_eq!(written[0].parent_id.as_deref(), Some("list"));
        assert_eq!(written[0].version, 1);

        let list = repo.get_block("list", Depth::CHILDREN).await.unwrap();
        assert_eq!(
            list.block().children_ids,
            vec!["item-1", "item-2", "note", "item-3", "item-4"],
            "{}",
            backend.name
        );
        assert_eq!(list.block().version, 2);
        assert!(list.contains("note"));
    }
}

#[tokio::test]
async fn test_upsert_attach_with_unknown_anchor_fails() {
    for backend in backends().await {
        let docs = seeded(&backend).await;
        let err = docs
            .repository()
            .upsert_blocks(
                vec![paragraph("note", "A note")],
                UpsertOptions::under("list").after("page-1"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BlockStoreError::InvalidHierarchy(_)), "{}", backend.name);
        assert!(docs
            .repository()
            .get_block("note", Depth::BLOCK)
            .await
            .is_err());
    }
}

#[tokio::test]
async fn test_upsert_existing_checks_version_and_ancestry() {
    for backend in backends().await {
        let docs = seeded(&backend).await;
        let repo = docs.repository();

        let mut item = repo
            .get_block("item-1", Depth::BLOCK)
            .await
            .unwrap()
            .block()
            .clone();
        item.set_property("rank", json!(10)).unwrap();

        let mut stale = item.clone();
        stale.version = 7;
        let err = repo
            .upsert_blocks(vec![stale], UpsertOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_conflict(), "{}", backend.name);

        let mut reparented = item.clone();
        reparented.parent_id = Some("doc".to_string());
        let err = repo
            .upsert_blocks(vec![reparented], UpsertOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BlockStoreError::InvalidHierarchy(_)), "{}", backend.name);

        let written = repo
            .upsert_blocks(vec![item], UpsertOptions::default())
            .await
            .unwrap();
        assert_eq!(written[0].version, 2);
        let stored = repo.get_block("item-1", Depth::BLOCK).await.unwrap();
        assert_eq!(stored.block().properties().raw()["rank"], json!(10));
    }
}

#[tokio::test]
async fn test_upsert_cannot_change_trash_state_or_workspace() {
    for backend in backends().await {
        let docs = seeded(&backend).await;
        let repo = docs.repository();

        let mut list = repo
            .get_block("list", Depth::BLOCK)
            .await
            .unwrap()
            .block()
            .clone();
        list.in_trash = true;
        let err = repo
            .upsert_blocks(vec![list], UpsertOptions::default())
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                BlockStoreError::InvalidHierarchy(HierarchyError::TrashStateChange { .. })
            ),
            "{}: {:?}",
            backend.name,
            err
        );
        let list = repo.get_block("list", Depth::CHILDREN).await.unwrap();
        assert_eq!(list.len(), 5, "{}", backend.name);
        assert_eq!(list.block().version, 1);

        // Restoring a single block by upsert would leave its subtree trashed
        repo.delete_block("list").await.unwrap();
        let mut trashed = repo
            .get_block_with("list", Depth::BLOCK, Visibility::IncludeTrashed)
            .await
            .unwrap()
            .block()
            .clone();
        trashed.in_trash = false;
        let err = repo
            .upsert_blocks(vec![trashed], UpsertOptions::default())
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                BlockStoreError::InvalidHierarchy(HierarchyError::TrashStateChange { .. })
            ),
            "{}: {:?}",
            backend.name,
            err
        );
        assert!(repo.get_block("list", Depth::BLOCK).await.is_err());

        let mut doc = repo
            .get_block("doc", Depth::BLOCK)
            .await
            .unwrap()
            .block()
            .clone();
        doc.workspace_id = "other-ws".to_string();
        let err = repo
            .upsert_blocks(vec![doc], UpsertOptions::default())
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                BlockStoreError::InvalidHierarchy(HierarchyError::WorkspaceChange { .. })
            ),
            "{}: {:?}",
            backend.name,
            err
        );
        let doc = repo.get_block("doc", Depth::BLOCK).await.unwrap();
        assert_eq!(doc.block().workspace_id, common::WORKSPACE);
        assert_eq!(doc.block().version, 1);
    }
}

// =========================================================================
// query_blocks
// =========================================================================

#[tokio::test]
async fn test_query_filters() {
    for backend in backends().await {
        let docs = seeded(&backend).await;
        let repo = docs.repository();
        let paragraphs = || BlockQuery::new(WhereClause::new().block_type(BlockType::Paragraph).root("doc"));

        let exact = paragraphs()
            .with_filter(PropertyFilter::equals("content.plain_text", json!("Finding 3")).unwrap());
        assert_eq!(ids(&repo.query_blocks(&exact).await.unwrap()), vec!["item-3"]);

        let numeric = paragraphs().with_filter(PropertyFilter::equals("rank", json!(2)).unwrap());
        assert_eq!(ids(&repo.query_blocks(&numeric).await.unwrap()), vec!["item-2"]);

        // No coercion between strings and numbers
        let as_string = paragraphs().with_filter(PropertyFilter::equals("rank", json!("2")).unwrap());
        assert!(repo.query_blocks(&as_string).await.unwrap().is_empty());

        // Missing values never match, not even not_equals
        let not_one = paragraphs().with_filter(PropertyFilter::not_equals("rank", json!(1)).unwrap());
        assert_eq!(
            ids(&repo.query_blocks(&not_one).await.unwrap()),
            vec!["item-2", "item-3", "item-4"]
        );

        let negated = paragraphs()
            .with_filter(FilterExpression::negate(PropertyFilter::equals("rank", json!(1)).unwrap().into()));
        assert_eq!(
            ids(&repo.query_blocks(&negated).await.unwrap()),
            vec!["item-2", "item-3", "item-4", "list"]
        );

        let set = paragraphs()
            .with_filter(PropertyFilter::is_in("rank", vec![json!(1), json!(4)]).unwrap());
        assert_eq!(ids(&repo.query_blocks(&set).await.unwrap()), vec!["item-1", "item-4"]);

        let substring = paragraphs()
            .with_filter(PropertyFilter::contains("content.plain_text", json!("ding")).unwrap())
            .with_limit(2);
        assert_eq!(ids(&repo.query_blocks(&substring).await.unwrap()), vec!["item-1", "item-2"]);

        let under_list = BlockQuery::new(WhereClause::new().root("doc")).with_parent(
            RelatedFilter::new(WhereClause::new().block_type(BlockType::Paragraph))
                .with_filter(PropertyFilter::equals("content.plain_text", json!("Findings")).unwrap()),
        );
        assert_eq!(
            ids(&repo.query_blocks(&under_list).await.unwrap()),
            vec!["item-1", "item-2", "item-3", "item-4"],
            "{}",
            backend.name
        );
    }
}

#[tokio::test]
async fn test_contains_on_numeric_field_is_unsupported() {
    for backend in backends().await {
        let docs = seeded(&backend).await;
        let query = BlockQuery::new(WhereClause::new().block_type(BlockType::Paragraph))
            .with_filter(PropertyFilter::contains("rank", json!("1")).unwrap());
        let err = docs.repository().query_blocks(&query).await.unwrap_err();
        assert!(
            matches!(err, BlockStoreError::UnsupportedOperator(_)),
            "{}: {:?}",
            backend.name,
            err
        );

        // Out of structural scope, the numeric field is never looked at
        let pages = BlockQuery::new(WhereClause::new().block_type(BlockType::PageGroup))
            .with_filter(PropertyFilter::contains("rank", json!("1")).unwrap());
        assert!(docs.repository().query_blocks(&pages).await.unwrap().is_empty());
    }
}

// =========================================================================
// Tree invariants
// =========================================================================

#[tokio::test]
async fn test_root_and_single_parent_invariants_hold_after_edits() {
    for backend in backends().await {
        let docs = seeded(&backend).await;
        let repo = docs.repository();

        repo.move_block("item-2", "doc", Position::End, 1).await.unwrap();
        repo.move_block("item-3", "item-2", Position::End, 1).await.unwrap();
        repo.upsert_blocks(vec![paragraph("note", "n")], UpsertOptions::under("item-3"))
            .await
            .unwrap();
        repo.delete_block("list").await.unwrap();

        let graph = repo
            .get_block_with("doc", Depth::All, Visibility::IncludeTrashed)
            .await
            .unwrap();
        let blocks: HashMap<&str, _> = graph.blocks().map(|b| (b.id.as_str(), b)).collect();

        let mut listed: HashMap<&str, usize> = HashMap::new();
        for block in blocks.values() {
            // Follow parent_id to the top
            let mut current = *block;
            while let Some(parent_id) = current.parent_id.as_deref() {
                current = blocks[parent_id];
            }
            assert_eq!(block.root_id, current.id, "{}: {}", backend.name, block.id);

            for child_id in &block.children_ids {
                *listed.entry(child_id.as_str()).or_default() += 1;
                assert_eq!(blocks[child_id.as_str()].parent_id.as_deref(), Some(block.id.as_str()));
            }
        }
        assert!(listed.values().all(|count| *count == 1), "{}", backend.name);
        assert_eq!(listed.len(), blocks.len() - 1);
    }
}
