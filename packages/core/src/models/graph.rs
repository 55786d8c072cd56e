//! Hydrated Block Graphs
//!
//! [`BlockGraph`] is the in-memory arena returned by a hydrated fetch: the
//! requested block plus whatever descendants the requested [`Depth`] loaded,
//! keyed by id. Navigation is plain map lookups and never goes back to storage.

use crate::models::Block;
use std::collections::{HashMap, HashSet, VecDeque};

/// How many levels of descendants to load with a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// The block and `n` levels below it (`Levels(0)` is the block alone)
    Levels(u32),
    /// Every descendant, loaded with one bulk fetch by `root_id`
    All,
}

impl Depth {
    pub const BLOCK: Depth = Depth::Levels(0);
    pub const CHILDREN: Depth = Depth::Levels(1);
}

impl Default for Depth {
    fn default() -> Self {
        Self::BLOCK
    }
}

/// Arena of blocks keyed by id, anchored at one requested block
#[derive(Debug, Clone, PartialEq)]
pub struct BlockGraph {
    anchor_id: String,
    blocks: HashMap<String, Block>,
}

impl BlockGraph {
    /// Build a graph anchored at `anchor`, adding `others` as loaded blocks
    pub fn new(anchor: Block, others: impl IntoIterator<Item = Block>) -> Self {
        let anchor_id = anchor.id.clone();
        let mut blocks: HashMap<String, Block> =
            others.into_iter().map(|b| (b.id.clone(), b)).collect();
        blocks.insert(anchor_id.clone(), anchor);
        Self { anchor_id, blocks }
    }

    /// The block that was requested
    pub fn block(&self) -> &Block {
        // The anchor is inserted on construction and never removed
        &self.blocks[&self.anchor_id]
    }

    pub fn anchor_id(&self) -> &str {
        &self.anchor_id
    }

    pub fn get(&self, id: &str) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.blocks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn parent_of(&self, block: &Block) -> Option<&Block> {
        block.parent_id.as_deref().and_then(|id| self.get(id))
    }

    /// Loaded children in `children_ids` order. Ids that were not loaded are skipped.
    pub fn children_of(&self, block: &Block) -> Vec<&Block> {
        block
            .children_ids
            .iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    pub fn children(&self, id: &str) -> Vec<&Block> {
        self.get(id).map(|b| self.children_of(b)).unwrap_or_default()
    }

    /// Depth-first pre-order walk from the anchor over loaded blocks
    pub fn pre_order(&self) -> Vec<&Block> {
        let mut out = Vec::with_capacity(self.blocks.len());
        let mut visited = HashSet::new();
        let mut stack = vec![self.block()];
        while let Some(block) = stack.pop() {
            if !visited.insert(block.id.as_str()) {
                continue;
            }
            out.push(block);
            for child in self.children_of(block).into_iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Breadth-first walk from the anchor; the anchor comes first
    pub fn breadth_first(&self) -> Vec<&Block> {
        let mut out = Vec::with_capacity(self.blocks.len());
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([self.block()]);
        while let Some(block) = queue.pop_front() {
            if !visited.insert(block.id.as_str()) {
                continue;
            }
            out.push(block);
            queue.extend(self.children_of(block));
        }
        out
    }

    /// All loaded blocks, unordered
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn into_blocks(self) -> HashMap<String, Block> {
        self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlockType;

    fn block(id: &str, parent: Option<&str>, children: &[&str]) -> Block {
        let mut builder = Block::builder(BlockType::Paragraph)
            .id(id)
            .workspace("ws")
            .children(children.iter().copied());
        if let Some(parent) = parent {
            builder = builder.parent(parent).root("a");
        }
        builder.build().unwrap()
    }

    fn sample() -> BlockGraph {
        BlockGraph::new(
            block("a", None, &["b", "e"]),
            vec![
                block("b", Some("a"), &["c", "d"]),
                block("c", Some("b"), &[]),
                block("d", Some("b"), &[]),
                block("e", Some("a"), &[]),
            ],
        )
    }

    #[test]
    fn test_navigation() {
        let graph = sample();
        assert_eq!(graph.block().id, "a");
        assert_eq!(graph.len(), 5);
        let ids: Vec<_> = graph.children("b").iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);
        let c = graph.get("c").unwrap();
        assert_eq!(graph.parent_of(c).unwrap().id, "b");
        assert!(graph.parent_of(graph.block()).is_none());
    }

    #[test]
    fn test_traversal_orders() {
        let graph = sample();
        let pre: Vec<_> = graph.pre_order().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(pre, vec!["a", "b", "c", "d", "e"]);
        let bfs: Vec<_> = graph.breadth_first().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(bfs, vec!["a", "b", "e", "c", "d"]);
    }

    #[test]
    fn test_unloaded_children_are_skipped() {
        let graph = BlockGraph::new(block("a", None, &["b", "missing"]), vec![block("b", Some("a"), &[])]);
        assert_eq!(graph.children("a").len(), 1);
        assert!(graph.children("missing").is_empty());
    }
}
