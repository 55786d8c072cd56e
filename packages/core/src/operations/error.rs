//! Error types for hierarchy validation
//!
//! Every structural write is checked against the tree invariants before
//! anything is sent to storage. These errors describe which invariant a write
//! would break.

use thiserror::Error;

/// Hierarchy invariant violations detected before a write
///
/// # Examples
///
/// ```rust
/// use blockstore_core::operations::HierarchyError;
///
/// let err = HierarchyError::Cycle {
///     block_id: "item-2".to_string(),
///     target_id: "item-2".to_string(),
/// };
/// assert!(err.to_string().contains("cycle"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HierarchyError {
    /// The write would place a block under itself or one of its descendants
    #[error("Placing '{block_id}' under '{target_id}' would create a cycle")]
    Cycle { block_id: String, target_id: String },

    /// The same id appears twice in one children list
    #[error("Child '{child_id}' is listed more than once under '{parent_id}'")]
    DuplicateChild { parent_id: String, child_id: String },

    /// A listed child does not exist
    #[error("Child '{child_id}' of '{parent_id}' does not exist")]
    UnknownChild { parent_id: String, child_id: String },

    /// A currently listed child would be dropped without a new parent
    #[error("Removing '{child_id}' from '{parent_id}' would orphan it")]
    Orphan { parent_id: String, child_id: String },

    /// A reorder changed the membership of the children list
    #[error("Reordering '{parent_id}' must keep the same set of children")]
    MembershipChanged { parent_id: String },

    /// Blocks belong to different canonical roots
    #[error("Cross-root change rejected: '{block_id}' is in root '{block_root}', target is in root '{target_root}'")]
    CrossRoot {
        block_id: String,
        block_root: String,
        target_root: String,
    },

    /// Blocks belong to different workspaces
    #[error("Cross-workspace change rejected: '{block_id}' is in workspace '{block_workspace}', target is in workspace '{target_workspace}'")]
    CrossWorkspace {
        block_id: String,
        block_workspace: String,
        target_workspace: String,
    },

    /// Root blocks have no parent to move away from
    #[error("Root block '{block_id}' cannot be moved or adopted")]
    RootImmovable { block_id: String },

    /// The named sibling is not a child of the target parent
    #[error("Anchor '{anchor_id}' not found in parent '{parent_id}'")]
    AnchorNotFound { parent_id: String, anchor_id: String },

    /// A visible block would sit under a trashed parent
    #[error("Cannot place visible block '{child_id}' under trashed parent '{parent_id}'")]
    TrashedParent { parent_id: String, child_id: String },

    /// A block names a parent that does not exist
    #[error("Parent '{parent_id}' of '{block_id}' does not exist")]
    MissingParent { block_id: String, parent_id: String },

    /// A parent does not list a block that points to it
    #[error("Block '{child_id}' is not listed in the children of its parent '{parent_id}'")]
    Unlisted { parent_id: String, child_id: String },

    /// A parent lists a block whose parent pointer names someone else
    #[error("Block '{child_id}' is listed by '{listed_by}' but its parent is {actual_parent:?}")]
    ParentMismatch {
        child_id: String,
        listed_by: String,
        actual_parent: Option<String>,
    },

    /// A block's root does not match the root of its parent chain
    #[error("Block '{block_id}' declares root '{declared_root}' but its chain leads to '{actual_root}'")]
    RootMismatch {
        block_id: String,
        declared_root: String,
        actual_root: String,
    },

    /// Upserts cannot change ancestry of an existing block
    #[error("Block '{block_id}' already exists under {stored_parent:?}; use a move to change its parent or root")]
    AncestryChange {
        block_id: String,
        stored_parent: Option<String>,
    },

    /// Upserts cannot move an existing block to another workspace
    #[error("Block '{block_id}' belongs to workspace '{stored_workspace}' and cannot change workspace")]
    WorkspaceChange {
        block_id: String,
        stored_workspace: String,
    },

    /// Trash state changes go through trash and restore, which handle the subtree
    #[error("Block '{block_id}' cannot change in_trash to {in_trash} by upsert; use set_in_trash, delete_block or restore_block")]
    TrashStateChange { block_id: String, in_trash: bool },

    /// The ancestor walk did not terminate within the configured depth
    #[error("Ancestor chain of '{block_id}' exceeds the maximum depth of {limit}")]
    DepthExceeded { block_id: String, limit: usize },

    /// The presented version does not match the stored one
    #[error("Version conflict on '{block_id}': expected {expected_version}, found {actual_version}")]
    VersionConflict {
        block_id: String,
        expected_version: i64,
        actual_version: i64,
    },
}

impl HierarchyError {
    pub fn version_conflict(
        block_id: impl Into<String>,
        expected_version: i64,
        actual_version: i64,
    ) -> Self {
        Self::VersionConflict {
            block_id: block_id.into(),
            expected_version,
            actual_version,
        }
    }

    pub fn cycle(block_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self::Cycle {
            block_id: block_id.into(),
            target_id: target_id.into(),
        }
    }
}
