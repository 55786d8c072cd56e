//! Canonical Document Order
//!
//! A block's position in reading order is the path of child indexes from its
//! root down to it. Comparing these paths lexicographically is the same as
//! walking the canonical tree depth-first and keeping only the blocks of
//! interest.

use crate::models::Block;
use crate::operations::BlockLookup;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Sort key: root id, then child indexes from the root down
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CanonicalKey {
    pub root_id: String,
    pub path: Vec<usize>,
}

impl CanonicalKey {
    /// Key for `block`, or `None` if its chain cannot be followed to a root
    ///
    /// Fails on a missing ancestor, a parent that does not list its child, a
    /// loop, or a chain longer than `max_depth`.
    pub fn for_block(lookup: &dyn BlockLookup, block: &Block, max_depth: usize) -> Option<Self> {
        let mut path = Vec::new();
        let mut seen = HashSet::from([block.id.as_str()]);
        let mut current = block;
        while let Some(parent_id) = current.parent_id.as_deref() {
            if path.len() >= max_depth || !seen.insert(parent_id) {
                return None;
            }
            let parent = lookup.lookup(parent_id)?;
            let index = parent.children_ids.iter().position(|id| *id == current.id)?;
            path.push(index);
            current = parent;
        }
        path.reverse();
        Some(Self {
            root_id: current.id.clone(),
            path,
        })
    }
}

/// Sort `blocks` into canonical order using ancestors from `lookup`
///
/// Blocks whose chain cannot be resolved go last, ordered by id.
pub fn sort_canonical(lookup: &dyn BlockLookup, blocks: Vec<Block>, max_depth: usize) -> Vec<Block> {
    let mut keyed: Vec<(Option<CanonicalKey>, Block)> = blocks
        .into_iter()
        .map(|block| (CanonicalKey::for_block(lookup, &block, max_depth), block))
        .collect();
    keyed.sort_by(|(a_key, a), (b_key, b)| match (a_key, b_key) {
        (Some(x), Some(y)) => x.cmp(y).then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });
    keyed.into_iter().map(|(_, block)| block).collect()
}
