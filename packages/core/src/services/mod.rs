//! Block Services
//!
//! This module contains the services callers talk to:
//!
//! - `BlockRepository` - Hydrated reads, queries and validated structural writes
//! - `CascadeEngine` - Subtree trash and restore as one batched write
//! - `GroupingResolver` - Group views in canonical reading order
//! - `DocumentStore` - Document-level façade over the two above
//!
//! Services coordinate between the storage layer and the pure checks in
//! [`operations`](crate::operations), and report failures as
//! [`BlockStoreError`].

pub mod cascade_engine;
pub mod document_store;
pub mod error;
pub mod grouping;
pub mod repository;

pub use cascade_engine::{CascadeEngine, CascadeOutcome};
pub use document_store::{DocumentStore, GroupView};
pub use error::BlockStoreError;
pub use grouping::{GroupScope, GroupingResolver};
pub use repository::{BlockRepository, UpsertOptions, Visibility};
