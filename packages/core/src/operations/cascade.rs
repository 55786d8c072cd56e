//! Cascade Planning
//!
//! Collects subtrees and decides which blocks a trash or restore flips. The
//! resulting plan is applied by the repository as one batched write.

use crate::models::Block;
use crate::operations::{BlockLookup, HierarchyError};
use std::collections::{HashSet, VecDeque};

/// Breadth-first ids of `root_id` and every loaded descendant
///
/// Children missing from `lookup` are skipped. Each id is visited once even if
/// the stored lists are inconsistent.
pub fn collect_subtree(lookup: &dyn BlockLookup, root_id: &str) -> Vec<String> {
    let mut ordered = Vec::new();
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([root_id.to_string()]);
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id.clone()) {
            continue;
        }
        let Some(block) = lookup.lookup(&id) else {
            continue;
        };
        queue.extend(block.children_ids.iter().cloned());
        ordered.push(id);
    }
    ordered
}

/// Blocks whose trash flag changes, in breadth-first order per target
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrashPlan {
    pub blocks: Vec<Block>,
}

impl TrashPlan {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.id.as_str()).collect()
    }
}

/// Decide which blocks to flip to `in_trash` for the given targets
///
/// With `cascade`, every descendant of each target is flipped together with it.
/// Without it only the targets change, which is rejected if a visible block
/// would end up under a trashed parent.
///
/// A restore needs each target's parent to be visible after the write.
pub fn plan_trash(
    lookup: &dyn BlockLookup,
    targets: &[String],
    in_trash: bool,
    cascade: bool,
) -> Result<TrashPlan, HierarchyError> {
    let mut scope: Vec<String> = Vec::new();
    let mut in_scope = HashSet::new();
    for target in targets {
        let ids = if cascade {
            collect_subtree(lookup, target)
        } else {
            vec![target.clone()]
        };
        for id in ids {
            if in_scope.insert(id.clone()) {
                scope.push(id);
            }
        }
    }

    for target in targets {
        let Some(block) = lookup.lookup(target) else {
            continue;
        };

        if !in_trash {
            if let Some(parent_id) = block.parent_id.as_deref() {
                let parent_visible = in_scope.contains(parent_id)
                    || lookup.lookup(parent_id).is_some_and(|p| !p.in_trash);
                if !parent_visible {
                    return Err(HierarchyError::TrashedParent {
                        parent_id: parent_id.to_string(),
                        child_id: block.id.clone(),
                    });
                }
            }
        } else if !cascade {
            let visible_child = block.children_ids.iter().find(|child_id| {
                !in_scope.contains(child_id.as_str())
                    && lookup.lookup(child_id).is_some_and(|c| !c.in_trash)
            });
            if let Some(child_id) = visible_child {
                return Err(HierarchyError::TrashedParent {
                    parent_id: block.id.clone(),
                    child_id: child_id.clone(),
                });
            }
        }
    }

    let blocks = scope
        .iter()
        .filter_map(|id| lookup.lookup(id))
        .filter(|block| block.in_trash != in_trash)
        .cloned()
        .collect();
    Ok(TrashPlan { blocks })
}
