//! Tests for the hierarchy validator

use super::*;
use crate::models::{Block, BlockType};
use std::collections::HashMap;

fn block(id: &str, parent: Option<&str>, children: &[&str]) -> Block {
    let mut builder = Block::builder(BlockType::Paragraph)
        .id(id)
        .workspace("ws")
        .children(children.iter().copied());
    if let Some(parent) = parent {
        builder = builder.parent(parent).root("doc");
    }
    builder.build().unwrap()
}

/// doc -> [list, page-1]; list -> [item-1, item-2]; page-1 -> []
fn fixture() -> HashMap<String, Block> {
    [
        block("doc", None, &["list", "page-1"]),
        block("list", Some("doc"), &["item-1", "item-2"]),
        block("item-1", Some("list"), &[]),
        block("item-2", Some("list"), &[]),
        block("page-1", Some("doc"), &[]),
    ]
    .into_iter()
    .map(|b| (b.id.clone(), b))
    .collect()
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Ancestors
// ============================================================================

#[test]
fn test_ancestors_nearest_first() {
    let blocks = fixture();
    let validator = HierarchyValidator::default();
    let chain = validator.ancestors(&blocks, &blocks["item-1"]).unwrap();
    let chain: Vec<_> = chain.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(chain, vec!["list", "doc"]);
}

#[test]
fn test_ancestors_depth_limit() {
    let blocks = fixture();
    let validator = HierarchyValidator::new(1);
    let err = validator.ancestors(&blocks, &blocks["item-1"]).unwrap_err();
    assert!(matches!(err, HierarchyError::DepthExceeded { limit: 1, .. }));
}

// ============================================================================
// set_children
// ============================================================================

#[test]
fn test_set_children_reorders_and_adopts() {
    let blocks = fixture();
    let validator = HierarchyValidator::default();
    let plan = validator
        .validate_set_children(&blocks, &blocks["list"], &ids(&["item-2", "item-1"]), 1)
        .unwrap();
    assert_eq!(plan.children, ids(&["item-2", "item-1"]));
    assert!(plan.adopted.is_empty());

    let plan = validator
        .validate_set_children(&blocks, &blocks["page-1"], &ids(&["item-2"]), 1)
        .unwrap();
    assert_eq!(
        plan.adopted,
        vec![Adoption {
            child_id: "item-2".to_string(),
            previous_parent: Some("list".to_string()),
        }]
    );
}

#[test]
fn test_set_children_rejects_stale_version() {
    let blocks = fixture();
    let err = HierarchyValidator::default()
        .validate_set_children(&blocks, &blocks["list"], &ids(&["item-1", "item-2"]), 7)
        .unwrap_err();
    assert_eq!(err, HierarchyError::version_conflict("list", 7, 1));
}

#[test]
fn test_set_children_rejects_duplicates_and_self() {
    let blocks = fixture();
    let validator = HierarchyValidator::default();
    let err = validator
        .validate_set_children(&blocks, &blocks["list"], &ids(&["item-1", "item-2", "item-1"]), 1)
        .unwrap_err();
    assert!(matches!(err, HierarchyError::DuplicateChild { .. }));

    let err = validator
        .validate_set_children(&blocks, &blocks["list"], &ids(&["item-1", "item-2", "list"]), 1)
        .unwrap_err();
    assert!(matches!(err, HierarchyError::Cycle { .. }));
}

#[test]
fn test_set_children_rejects_orphans_and_unknown_ids() {
    let blocks = fixture();
    let validator = HierarchyValidator::default();
    let err = validator
        .validate_set_children(&blocks, &blocks["list"], &ids(&["item-1"]), 1)
        .unwrap_err();
    assert_eq!(
        err,
        HierarchyError::Orphan {
            parent_id: "list".to_string(),
            child_id: "item-2".to_string(),
        }
    );

    let err = validator
        .validate_set_children(&blocks, &blocks["page-1"], &ids(&["ghost"]), 1)
        .unwrap_err();
    assert!(matches!(err, HierarchyError::UnknownChild { .. }));
}

#[test]
fn test_set_children_rejects_ancestor_adoption() {
    let blocks = fixture();
    let validator = HierarchyValidator::default();
    // list is the parent of item-1, so adopting it under item-1 loops
    let err = validator
        .validate_set_children(&blocks, &blocks["item-1"], &ids(&["list"]), 1)
        .unwrap_err();
    assert!(matches!(err, HierarchyError::Cycle { .. }));

    let err = validator
        .validate_set_children(&blocks, &blocks["list"], &ids(&["item-1", "item-2", "doc"]), 1)
        .unwrap_err();
    assert!(matches!(err, HierarchyError::RootImmovable { .. }));
}

// ============================================================================
// reorder
// ============================================================================

#[test]
fn test_reorder_keeps_membership() {
    let blocks = fixture();
    let validator = HierarchyValidator::default();
    let order = validator
        .validate_reorder(&blocks["list"], &ids(&["item-2", "item-1"]), 1)
        .unwrap();
    assert_eq!(order, ids(&["item-2", "item-1"]));

    let err = validator
        .validate_reorder(&blocks["list"], &ids(&["item-2"]), 1)
        .unwrap_err();
    assert!(matches!(err, HierarchyError::MembershipChanged { .. }));
}

// ============================================================================
// move
// ============================================================================

#[test]
fn test_move_after_anchor() {
    let blocks = fixture();
    let validator = HierarchyValidator::default();
    let plan = validator
        .validate_move(
            &blocks,
            &blocks["item-1"],
            &blocks["doc"],
            &Position::After("list".to_string()),
        )
        .unwrap();
    assert_eq!(plan.new_parent_children, ids(&["list", "item-1", "page-1"]));
    assert_eq!(plan.index, 1);
    assert_eq!(plan.old_parent, Some(("list".to_string(), ids(&["item-2"]))));
}

#[test]
fn test_move_within_same_parent() {
    let blocks = fixture();
    let plan = HierarchyValidator::default()
        .validate_move(&blocks, &blocks["item-1"], &blocks["list"], &Position::End)
        .unwrap();
    assert_eq!(plan.new_parent_children, ids(&["item-2", "item-1"]));
    assert!(plan.old_parent.is_none());
}

#[test]
fn test_move_index_is_clamped() {
    let blocks = fixture();
    let plan = HierarchyValidator::default()
        .validate_move(&blocks, &blocks["item-2"], &blocks["page-1"], &Position::Index(10))
        .unwrap();
    assert_eq!(plan.new_parent_children, ids(&["item-2"]));
    assert_eq!(plan.index, 0);
}

#[test]
fn test_move_under_itself_or_descendant() {
    let blocks = fixture();
    let validator = HierarchyValidator::default();
    let err = validator
        .validate_move(&blocks, &blocks["list"], &blocks["list"], &Position::End)
        .unwrap_err();
    assert!(matches!(err, HierarchyError::Cycle { .. }));

    let err = validator
        .validate_move(&blocks, &blocks["list"], &blocks["item-1"], &Position::End)
        .unwrap_err();
    assert!(matches!(err, HierarchyError::Cycle { .. }));
}

#[test]
fn test_move_rejects_root_and_missing_anchor() {
    let blocks = fixture();
    let validator = HierarchyValidator::default();
    let err = validator
        .validate_move(&blocks, &blocks["doc"], &blocks["page-1"], &Position::End)
        .unwrap_err();
    assert!(matches!(err, HierarchyError::RootImmovable { .. }));

    let err = validator
        .validate_move(
            &blocks,
            &blocks["item-1"],
            &blocks["doc"],
            &Position::After("item-2".to_string()),
        )
        .unwrap_err();
    assert!(matches!(err, HierarchyError::AnchorNotFound { .. }));
}

#[test]
fn test_move_rejects_trashed_parent() {
    let mut blocks = fixture();
    blocks.get_mut("page-1").unwrap().in_trash = true;
    let err = HierarchyValidator::default()
        .validate_move(&blocks, &blocks["item-1"], &blocks["page-1"], &Position::End)
        .unwrap_err();
    assert!(matches!(err, HierarchyError::TrashedParent { .. }));
}

// ============================================================================
// Batches
// ============================================================================

#[test]
fn test_batch_of_new_tree_is_valid() {
    let batch: Vec<Block> = fixture().into_values().collect();
    HierarchyValidator::default()
        .validate_batch(&batch, &HashMap::<String, Block>::new())
        .unwrap();
}

#[test]
fn test_batch_rejects_unlisted_child() {
    let mut blocks = fixture();
    blocks.get_mut("list").unwrap().children_ids = ids(&["item-1"]);
    let batch: Vec<Block> = blocks.into_values().collect();
    let err = HierarchyValidator::default()
        .validate_batch(&batch, &HashMap::<String, Block>::new())
        .unwrap_err();
    assert!(matches!(err, HierarchyError::Unlisted { .. }));
}

#[test]
fn test_batch_rejects_wrong_root() {
    let mut blocks = fixture();
    for id in ["list", "item-1", "item-2", "page-1"] {
        blocks.get_mut(id).unwrap().root_id = "elsewhere".to_string();
    }
    let batch: Vec<Block> = blocks.into_values().collect();
    let err = HierarchyValidator::default()
        .validate_batch(&batch, &HashMap::<String, Block>::new())
        .unwrap_err();
    assert!(matches!(err, HierarchyError::RootMismatch { .. }));
}

#[test]
fn test_batch_rejects_ancestry_change() {
    let stored = fixture();
    let mut moved = stored["item-1"].clone();
    moved.parent_id = Some("page-1".to_string());
    let err = HierarchyValidator::default()
        .validate_batch(&[moved], &stored)
        .unwrap_err();
    assert!(matches!(err, HierarchyError::AncestryChange { .. }));
}

#[test]
fn test_batch_rejects_workspace_change() {
    let stored = fixture();
    let mut doc = stored["doc"].clone();
    doc.workspace_id = "other-ws".to_string();
    let err = HierarchyValidator::default()
        .validate_batch(&[doc], &stored)
        .unwrap_err();
    assert!(matches!(err, HierarchyError::WorkspaceChange { .. }));
}

#[test]
fn test_batch_rejects_trash_flag_change() {
    let mut stored = fixture();
    let mut list = stored["list"].clone();
    list.in_trash = true;
    let err = HierarchyValidator::default()
        .validate_batch(&[list], &stored)
        .unwrap_err();
    assert_eq!(
        err,
        HierarchyError::TrashStateChange {
            block_id: "list".to_string(),
            in_trash: true,
        }
    );

    stored.get_mut("item-1").unwrap().in_trash = true;
    let mut item = stored["item-1"].clone();
    item.in_trash = false;
    let err = HierarchyValidator::default()
        .validate_batch(&[item], &stored)
        .unwrap_err();
    assert!(matches!(err, HierarchyError::TrashStateChange { in_trash: false, .. }));
}

#[test]
fn test_batch_extends_stored_tree() {
    let stored = fixture();
    let mut page = stored["page-1"].clone();
    page.children_ids = ids(&["new"]);
    let child = block("new", Some("page-1"), &[]);
    HierarchyValidator::default()
        .validate_batch(&[page, child], &stored)
        .unwrap();
}
