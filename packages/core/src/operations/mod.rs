//! Block Operations
//!
//! Storage-independent logic shared by every backend:
//!
//! - [`HierarchyValidator`] - tree invariants for structural writes
//! - [`cascade`] - subtree collection and trash/restore planning
//! - [`FilterEngine`] - in-memory evaluation of [`BlockQuery`](crate::models::BlockQuery)
//! - [`ordering`] - canonical document order keys
//!
//! All of these work on snapshots handed to them through [`BlockLookup`] and
//! never perform I/O themselves.

pub mod cascade;
pub mod error;
pub mod filter_engine;
pub mod hierarchy;
pub mod ordering;

pub use cascade::{collect_subtree, plan_trash, TrashPlan};
pub use error::HierarchyError;
pub use filter_engine::FilterEngine;
pub use hierarchy::{
    Adoption, HierarchyValidator, MovePlan, Position, SetChildrenPlan, DEFAULT_MAX_TREE_DEPTH,
};
pub use ordering::{sort_canonical, CanonicalKey};

use crate::models::{Block, BlockGraph};
use std::collections::HashMap;

/// Read access to a snapshot of blocks by id
pub trait BlockLookup {
    fn lookup(&self, id: &str) -> Option<&Block>;
}

impl BlockLookup for HashMap<String, Block> {
    fn lookup(&self, id: &str) -> Option<&Block> {
        self.get(id)
    }
}

impl BlockLookup for HashMap<&str, &Block> {
    fn lookup(&self, id: &str) -> Option<&Block> {
        self.get(id).copied()
    }
}

impl BlockLookup for BlockGraph {
    fn lookup(&self, id: &str) -> Option<&Block> {
        self.get(id)
    }
}
