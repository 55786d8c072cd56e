//! Block Store Core
//!
//! This crate stores documents as trees of typed blocks and keeps the tree
//! consistent under concurrent edits.
//!
//! # Architecture
//!
//! - **Canonical tree**: every block has one parent, listed in the parent's
//!   ordered `children_ids`; `root_id` names the top of the chain
//! - **Secondary views**: pages and chunks are anchor blocks referenced by tag
//!   from `properties.groups`, never by re-parenting
//! - **Soft delete**: trash flips `in_trash` on a whole subtree in one write
//! - **Optimistic concurrency**: every write is a compare-and-swap on `version`
//! - **Two backends**: libsql/SQLite and embedded SurrealDB behind one trait
//!
//! # Modules
//!
//! - [`models`] - Blocks, typed properties, queries and hydrated graphs
//! - [`operations`] - Storage-independent validation, filtering and ordering
//! - [`db`] - `BlockStore` trait and its libsql and SurrealDB implementations
//! - [`services`] - Repository, cascade engine, grouping resolver, document façade
//! - [`config`] - `StoreConfig` and backend selection

pub mod config;
pub mod db;
pub mod models;
pub mod operations;
pub mod services;

// Re-export commonly used types
pub use config::{open_store, BackendKind, StoreConfig};
pub use models::*;
pub use services::*;
