//! Service Layer Error Types
//!
//! [`BlockStoreError`] is the public error taxonomy of the block store. Lower
//! layers keep their own enums; the `From` impls here decide which public
//! category each of them lands in.

use crate::db::DatabaseError;
use crate::models::{FilterError, ValidationError};
use crate::operations::HierarchyError;
use thiserror::Error;

/// Block store operation errors
#[derive(Error, Debug)]
pub enum BlockStoreError {
    /// A block failed construction-time validation
    #[error("Block validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A write would break a tree invariant
    #[error("Invalid hierarchy: {0}")]
    InvalidHierarchy(HierarchyError),

    /// Stale version; refetch and retry
    #[error("Version conflict on block {block_id}: expected {expected_version:?}, found {actual_version:?}")]
    Conflict {
        block_id: String,
        expected_version: Option<i64>,
        actual_version: Option<i64>,
    },

    /// Operator/value type mismatch found while evaluating a filter
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(FilterError),

    /// Malformed filter
    #[error("Invalid filter: {0}")]
    InvalidFilter(FilterError),

    /// Single-block fetch for an id that does not exist
    #[error("Block not found: {id}")]
    NotFound { id: String },

    /// Document-only operation on a block of another type
    #[error("Block {id} is a {block_type}, not a document")]
    NotADocument { id: String, block_type: String },

    /// Storage failure
    #[error("Database operation failed: {0}")]
    Database(DatabaseError),
}

impl BlockStoreError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn conflict(
        block_id: impl Into<String>,
        expected_version: Option<i64>,
        actual_version: Option<i64>,
    ) -> Self {
        Self::Conflict {
            block_id: block_id.into(),
            expected_version,
            actual_version,
        }
    }

    pub fn not_a_document(id: impl Into<String>, block_type: impl Into<String>) -> Self {
        Self::NotADocument {
            id: id.into(),
            block_type: block_type.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether retrying the same operation may succeed without caller changes
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database(e) if e.is_transient())
    }
}

impl From<HierarchyError> for BlockStoreError {
    fn from(err: HierarchyError) -> Self {
        match err {
            HierarchyError::VersionConflict {
                block_id,
                expected_version,
                actual_version,
            } => Self::conflict(block_id, Some(expected_version), Some(actual_version)),
            other => Self::InvalidHierarchy(other),
        }
    }
}

impl From<FilterError> for BlockStoreError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::UnsupportedOperator { .. } => Self::UnsupportedOperator(err),
            other => Self::InvalidFilter(other),
        }
    }
}

impl From<DatabaseError> for BlockStoreError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::WriteConflict {
                block_id,
                expected_version,
                actual_version,
            } => Self::conflict(block_id, expected_version, actual_version),
            other => Self::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FilterOperator;

    #[test]
    fn test_hierarchy_version_conflict_becomes_conflict() {
        let err: BlockStoreError = HierarchyError::version_conflict("doc", 1, 2).into();
        assert!(matches!(
            err,
            BlockStoreError::Conflict {
                expected_version: Some(1),
                actual_version: Some(2),
                ..
            }
        ));

        let err: BlockStoreError = HierarchyError::cycle("a", "a").into();
        assert!(matches!(err, BlockStoreError::InvalidHierarchy(_)));
    }

    #[test]
    fn test_write_conflict_becomes_conflict() {
        let err: BlockStoreError = DatabaseError::write_conflict("x", Some(3), None).into();
        assert!(err.is_conflict());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_filter_errors_split_by_kind() {
        let unsupported: BlockStoreError = FilterError::UnsupportedOperator {
            operator: FilterOperator::Contains,
            path: "properties.level".to_string(),
            found: "number".to_string(),
        }
        .into();
        assert!(matches!(unsupported, BlockStoreError::UnsupportedOperator(_)));

        let invalid: BlockStoreError = FilterError::EmptyPath.into();
        assert!(matches!(invalid, BlockStoreError::InvalidFilter(_)));
    }
}
