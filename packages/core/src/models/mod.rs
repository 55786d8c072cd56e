//! Data Models
//!
//! This module contains the core data structures of the block store:
//!
//! - `Block` - Universal typed node of the canonical tree
//! - `BlockProperties` / `TypedProperties` - Per-type property schemas over raw JSON
//! - `BlockQuery` and friends - Structural and semantic filter descriptions
//! - `BlockGraph` - Hydrated in-memory arena returned by depth-controlled fetches

mod block;
mod filter;
mod graph;
mod properties;

pub use block::{
    Block, BlockBuilder, BlockRecord, BlockType, Content, ValidationError, CONTENT_KEYS,
    INITIAL_VERSION,
};
pub use filter::{
    BlockQuery, FieldMatch, FilterError, FilterExpression, FilterOperator, FilterValue, PathRoot,
    PathSegment, PropertyFilter, PropertyPath, RelatedFilter, Scalar, WhereClause,
};
pub use graph::{BlockGraph, Depth};
pub use properties::{BlockProperties, GroupIndexKind, TypedProperties, GROUPS_KEY};
