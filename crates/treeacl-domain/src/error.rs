//! Domain error types for access resolution.

use thiserror::Error;
use treeacl_storage::{NodeId, StorageError, TreeKind};

/// Domain-specific errors for access resolution.
///
/// A missing subject, resource or action is not an error: lookups report it
/// as `None` and checks as `false`. Only storage failures and broken tree
/// structure surface here.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The underlying store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A parent chain loops back on itself, or a re-parent would make it do so.
    #[error("cycle detected in {kind} tree at node {node_id}")]
    CycleDetected { kind: TreeKind, node_id: NodeId },

    /// Ancestor walk exceeded the configured depth.
    #[error("depth limit exceeded in {kind} tree (max: {max_depth})")]
    DepthLimitExceeded { kind: TreeKind, max_depth: u32 },

    /// A reference that cannot name any node (e.g. an empty field set).
    #[error("invalid node reference: {value}")]
    InvalidReference { value: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
