//! Database Layer
//!
//! This module handles block persistence behind the [`BlockStore`] trait:
//!
//! - `TursoStore`: libsql/SQLite, JSON columns filtered with `json_extract`
//! - `SurrealStore`: embedded SurrealDB (RocksDB or in-memory), SCHEMALESS
//!   documents filtered with native field paths
//!
//! Both backends apply writes as compare-and-swap batches in one transaction
//! and return query matches ordered by id, so the repository above them does
//! not care which one it talks to. [`ParityRunner`] checks that claim.

mod block_store;
mod database;
mod error;
pub mod parity;
pub mod sql_filter;
#[cfg(feature = "surrealdb")]
pub mod surreal_filter;
#[cfg(feature = "surrealdb")]
mod surreal_store;
mod turso_store;

pub use block_store::{BlockStore, BlockWrite, WriteBatch};
pub use database::{DatabaseService, DEFAULT_BUSY_TIMEOUT_MS};
pub use error::DatabaseError;
pub use parity::{ParityResult, ParityRunner, ParityTiming};
#[cfg(feature = "surrealdb")]
pub use surreal_store::SurrealStore;
pub use turso_store::TursoStore;
