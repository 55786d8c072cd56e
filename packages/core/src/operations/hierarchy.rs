//! Hierarchy Validator
//!
//! Pure checks over snapshots of the blocks a write touches. Nothing here talks
//! to storage: the repository loads the relevant rows, asks the validator for a
//! plan, and only then opens a transaction to apply it.
//!
//! Invariants enforced:
//!
//! - a non-root block has exactly one parent, which lists it exactly once
//! - `root_id` is shared by every block on a parent chain and names the parentless end
//! - the parent/child graph is acyclic
//! - membership and order of `children_ids` change only through the parent

use crate::models::Block;
use crate::operations::{BlockLookup, HierarchyError};
use std::collections::{HashMap, HashSet};

/// Default bound for ancestor walks
pub const DEFAULT_MAX_TREE_DEPTH: usize = 4096;

/// Where a moved block lands among its new siblings
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Position {
    /// Append after the last child
    #[default]
    End,
    /// Insert immediately after the named sibling
    After(String),
    /// Insert at this index, clamped to the list length
    Index(usize),
}

/// A block taken over by a new parent through `set_children`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adoption {
    pub child_id: String,
    pub previous_parent: Option<String>,
}

/// Validated outcome of `validate_set_children`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetChildrenPlan {
    pub children: Vec<String>,
    pub adopted: Vec<Adoption>,
}

/// Validated outcome of `validate_move`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    /// Children of the new parent after the insert
    pub new_parent_children: Vec<String>,
    /// Previous parent and its children after the removal, when the parent changes
    pub old_parent: Option<(String, Vec<String>)>,
    /// Index the block lands at
    pub index: usize,
}

/// Enforces single-parent, acyclic, parent-owned ordering rules
#[derive(Debug, Clone, Copy)]
pub struct HierarchyValidator {
    max_depth: usize,
}

impl Default for HierarchyValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TREE_DEPTH)
    }
}

impl HierarchyValidator {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Ancestors of `block`, nearest first, ending at the root
    ///
    /// Stops early if a parent is not available in `lookup`. A chain longer
    /// than the configured depth, or one that loops, is an error.
    pub fn ancestors<'a>(
        &self,
        lookup: &'a dyn BlockLookup,
        block: &Block,
    ) -> Result<Vec<&'a Block>, HierarchyError> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([block.id.clone()]);
        let mut next = block.parent_id.clone();
        while let Some(parent_id) = next {
            if chain.len() >= self.max_depth {
                return Err(HierarchyError::DepthExceeded {
                    block_id: block.id.clone(),
                    limit: self.max_depth,
                });
            }
            if !seen.insert(parent_id.clone()) {
                return Err(HierarchyError::cycle(block.id.clone(), parent_id));
            }
            let Some(parent) = lookup.lookup(&parent_id) else {
                break;
            };
            chain.push(parent);
            next = parent.parent_id.clone();
        }
        Ok(chain)
    }

    /// True if `candidate` is `block` itself or lies below it
    pub fn is_descendant_or_self(
        &self,
        lookup: &dyn BlockLookup,
        candidate: &Block,
        block_id: &str,
    ) -> Result<bool, HierarchyError> {
        if candidate.id == block_id {
            return Ok(true);
        }
        Ok(self
            .ancestors(lookup, candidate)?
            .iter()
            .any(|ancestor| ancestor.id == block_id))
    }

    /// Check a full replacement of `parent`'s children list
    ///
    /// Every id must be unique, every current child must stay, and any new id
    /// must be an existing block of the same root that is not an ancestor of
    /// `parent`. New ids are adopted away from their previous parent.
    pub fn validate_set_children(
        &self,
        lookup: &dyn BlockLookup,
        parent: &Block,
        new_children: &[String],
        expected_version: i64,
    ) -> Result<SetChildrenPlan, HierarchyError> {
        if parent.version != expected_version {
            return Err(HierarchyError::version_conflict(
                parent.id.clone(),
                expected_version,
                parent.version,
            ));
        }

        let mut seen = HashSet::with_capacity(new_children.len());
        for child_id in new_children {
            if child_id == &parent.id {
                return Err(HierarchyError::cycle(child_id.clone(), parent.id.clone()));
            }
            if !seen.insert(child_id.as_str()) {
                return Err(HierarchyError::DuplicateChild {
                    parent_id: parent.id.clone(),
                    child_id: child_id.clone(),
                });
            }
        }

        if let Some(dropped) = parent
            .children_ids
            .iter()
            .find(|id| !seen.contains(id.as_str()))
        {
            return Err(HierarchyError::Orphan {
                parent_id: parent.id.clone(),
                child_id: dropped.clone(),
            });
        }

        let current: HashSet<&str> = parent.children_ids.iter().map(String::as_str).collect();
        let mut adopted = Vec::new();
        for child_id in new_children {
            if current.contains(child_id.as_str()) {
                continue;
            }
            let child = lookup
                .lookup(child_id)
                .ok_or_else(|| HierarchyError::UnknownChild {
                    parent_id: parent.id.clone(),
                    child_id: child_id.clone(),
                })?;
            self.check_attach(lookup, child, parent)?;
            adopted.push(Adoption {
                child_id: child_id.clone(),
                previous_parent: child.parent_id.clone(),
            });
        }

        Ok(SetChildrenPlan {
            children: new_children.to_vec(),
            adopted,
        })
    }

    /// Check a reorder: the same set of children in a new order
    pub fn validate_reorder(
        &self,
        parent: &Block,
        new_children: &[String],
        expected_version: i64,
    ) -> Result<Vec<String>, HierarchyError> {
        if parent.version != expected_version {
            return Err(HierarchyError::version_conflict(
                parent.id.clone(),
                expected_version,
                parent.version,
            ));
        }
        let mut seen = HashSet::with_capacity(new_children.len());
        for child_id in new_children {
            if !seen.insert(child_id.as_str()) {
                return Err(HierarchyError::DuplicateChild {
                    parent_id: parent.id.clone(),
                    child_id: child_id.clone(),
                });
            }
        }
        let current: HashSet<&str> = parent.children_ids.iter().map(String::as_str).collect();
        if current != seen {
            return Err(HierarchyError::MembershipChanged {
                parent_id: parent.id.clone(),
            });
        }
        Ok(new_children.to_vec())
    }

    /// Check moving `block` under `new_parent` at `position`
    ///
    /// Inserting at a named sibling always lands after it; no anchor appends.
    pub fn validate_move(
        &self,
        lookup: &dyn BlockLookup,
        block: &Block,
        new_parent: &Block,
        position: &Position,
    ) -> Result<MovePlan, HierarchyError> {
        if block.id == new_parent.id {
            return Err(HierarchyError::cycle(block.id.clone(), new_parent.id.clone()));
        }
        self.check_attach(lookup, block, new_parent)?;

        let mut siblings: Vec<String> = new_parent
            .children_ids
            .iter()
            .filter(|id| **id != block.id)
            .cloned()
            .collect();

        let index = match position {
            Position::End => siblings.len(),
            Position::Index(index) => (*index).min(siblings.len()),
            Position::After(anchor_id) => {
                let anchor = siblings.iter().position(|id| id == anchor_id).ok_or_else(|| {
                    HierarchyError::AnchorNotFound {
                        parent_id: new_parent.id.clone(),
                        anchor_id: anchor_id.clone(),
                    }
                })?;
                anchor + 1
            }
        };
        siblings.insert(index, block.id.clone());

        let old_parent = match block.parent_id.as_deref() {
            Some(old_id) if old_id != new_parent.id => {
                let old = lookup
                    .lookup(old_id)
                    .ok_or_else(|| HierarchyError::MissingParent {
                        block_id: block.id.clone(),
                        parent_id: old_id.to_string(),
                    })?;
                let remaining = old
                    .children_ids
                    .iter()
                    .filter(|id| **id != block.id)
                    .cloned()
                    .collect();
                Some((old.id.clone(), remaining))
            }
            _ => None,
        };

        Ok(MovePlan {
            new_parent_children: siblings,
            old_parent,
            index,
        })
    }

    /// Rules shared by moves and adoptions of an existing block under `parent`
    fn check_attach(
        &self,
        lookup: &dyn BlockLookup,
        block: &Block,
        parent: &Block,
    ) -> Result<(), HierarchyError> {
        if block.is_root() {
            return Err(HierarchyError::RootImmovable {
                block_id: block.id.clone(),
            });
        }
        if block.workspace_id != parent.workspace_id {
            return Err(HierarchyError::CrossWorkspace {
                block_id: block.id.clone(),
                block_workspace: block.workspace_id.clone(),
                target_workspace: parent.workspace_id.clone(),
            });
        }
        if block.root_id != parent.root_id {
            return Err(HierarchyError::CrossRoot {
                block_id: block.id.clone(),
                block_root: block.root_id.clone(),
                target_root: parent.root_id.clone(),
            });
        }
        if self.is_descendant_or_self(lookup, parent, &block.id)? {
            return Err(HierarchyError::cycle(block.id.clone(), parent.id.clone()));
        }
        if parent.in_trash && !block.in_trash {
            return Err(HierarchyError::TrashedParent {
                parent_id: parent.id.clone(),
                child_id: block.id.clone(),
            });
        }
        Ok(())
    }

    /// Check that a batch of blocks, overlaid on what is stored, forms a valid forest
    ///
    /// `stored` must contain the persisted version of every batch block that
    /// already exists, plus any parent or child referenced from the batch.
    /// Blocks outside the batch are assumed to satisfy the invariants already.
    pub fn validate_batch(
        &self,
        batch: &[Block],
        stored: &dyn BlockLookup,
    ) -> Result<(), HierarchyError> {
        let mut overlay = BatchOverlay {
            batch: HashMap::with_capacity(batch.len()),
            stored,
        };
        for block in batch {
            if overlay.batch.insert(block.id.as_str(), block).is_some() {
                return Err(HierarchyError::DuplicateChild {
                    parent_id: block.parent_id.clone().unwrap_or_default(),
                    child_id: block.id.clone(),
                });
            }
        }

        for block in batch {
            if let Some(existing) = stored.lookup(&block.id) {
                if existing.parent_id != block.parent_id || existing.root_id != block.root_id {
                    return Err(HierarchyError::AncestryChange {
                        block_id: block.id.clone(),
                        stored_parent: existing.parent_id.clone(),
                    });
                }
                if existing.workspace_id != block.workspace_id {
                    return Err(HierarchyError::WorkspaceChange {
                        block_id: block.id.clone(),
                        stored_workspace: existing.workspace_id.clone(),
                    });
                }
                if existing.in_trash != block.in_trash {
                    return Err(HierarchyError::TrashStateChange {
                        block_id: block.id.clone(),
                        in_trash: block.in_trash,
                    });
                }
                if let Some(dropped) = existing
                    .children_ids
                    .iter()
                    .find(|id| !block.children_ids.contains(id))
                {
                    return Err(HierarchyError::Orphan {
                        parent_id: block.id.clone(),
                        child_id: dropped.clone(),
                    });
                }
            }

            if let Some(parent_id) = block.parent_id.as_deref() {
                let parent =
                    overlay
                        .lookup(parent_id)
                        .ok_or_else(|| HierarchyError::MissingParent {
                            block_id: block.id.clone(),
                            parent_id: parent_id.to_string(),
                        })?;
                if !parent.children_ids.iter().any(|id| id == &block.id) {
                    return Err(HierarchyError::Unlisted {
                        parent_id: parent.id.clone(),
                        child_id: block.id.clone(),
                    });
                }
                if parent.workspace_id != block.workspace_id {
                    return Err(HierarchyError::CrossWorkspace {
                        block_id: block.id.clone(),
                        block_workspace: block.workspace_id.clone(),
                        target_workspace: parent.workspace_id.clone(),
                    });
                }
                if parent.root_id != block.root_id {
                    return Err(HierarchyError::RootMismatch {
                        block_id: block.id.clone(),
                        declared_root: block.root_id.clone(),
                        actual_root: parent.root_id.clone(),
                    });
                }
                if parent.in_trash && !block.in_trash {
                    return Err(HierarchyError::TrashedParent {
                        parent_id: parent.id.clone(),
                        child_id: block.id.clone(),
                    });
                }
            }

            for child_id in &block.children_ids {
                let child = overlay
                    .lookup(child_id)
                    .ok_or_else(|| HierarchyError::UnknownChild {
                        parent_id: block.id.clone(),
                        child_id: child_id.clone(),
                    })?;
                if child.parent_id.as_deref() != Some(block.id.as_str()) {
                    return Err(HierarchyError::ParentMismatch {
                        child_id: child_id.clone(),
                        listed_by: block.id.clone(),
                        actual_parent: child.parent_id.clone(),
                    });
                }
            }

            self.check_chain(block, &overlay)?;
        }

        Ok(())
    }

    /// Walk up from a batch block until the chain leaves the batch or ends
    fn check_chain(&self, block: &Block, overlay: &BatchOverlay<'_>) -> Result<(), HierarchyError> {
        let mut seen = HashSet::from([block.id.as_str()]);
        let mut next = block.parent_id.as_deref();
        let mut steps = 0usize;
        while let Some(parent_id) = next {
            steps += 1;
            if steps > self.max_depth {
                return Err(HierarchyError::DepthExceeded {
                    block_id: block.id.clone(),
                    limit: self.max_depth,
                });
            }
            if seen.contains(parent_id) {
                return Err(HierarchyError::cycle(block.id.clone(), parent_id));
            }
            let parent = overlay
                .lookup(parent_id)
                .ok_or_else(|| HierarchyError::MissingParent {
                    block_id: block.id.clone(),
                    parent_id: parent_id.to_string(),
                })?;
            let persisted = !overlay.batch.contains_key(parent.id.as_str());
            if persisted || parent.parent_id.is_none() {
                let actual_root = if persisted { &parent.root_id } else { &parent.id };
                if *actual_root != block.root_id {
                    return Err(HierarchyError::RootMismatch {
                        block_id: block.id.clone(),
                        declared_root: block.root_id.clone(),
                        actual_root: actual_root.clone(),
                    });
                }
                return Ok(());
            }
            seen.insert(parent.id.as_str());
            next = parent.parent_id.as_deref();
        }
        Ok(())
    }
}

/// Batch blocks shadowing their stored versions
struct BatchOverlay<'a> {
    batch: HashMap<&'a str, &'a Block>,
    stored: &'a dyn BlockLookup,
}

impl BlockLookup for BatchOverlay<'_> {
    fn lookup(&self, id: &str) -> Option<&Block> {
        match self.batch.get(id) {
            Some(block) => Some(*block),
            None => self.stored.lookup(id),
        }
    }
}

#[cfg(test)]
#[path = "hierarchy_test.rs"]
mod hierarchy_test;
