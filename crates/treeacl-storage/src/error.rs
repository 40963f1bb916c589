//! Storage error types.

use thiserror::Error;

use crate::traits::{NodeId, TreeKind};

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Node not found.
    #[error("{kind} node not found: {id}")]
    NodeNotFound { kind: TreeKind, id: NodeId },

    /// Parent referenced by an insert or update does not exist.
    #[error("{kind} parent node not found: {parent_id}")]
    ParentNotFound { kind: TreeKind, parent_id: NodeId },

    /// Invalid input error.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Database connection error.
    #[error("database connection error: {message}")]
    ConnectionError { message: String },

    /// Database query error.
    #[error("database query error: {message}")]
    QueryError { message: String },

    /// Internal error.
    #[error("internal storage error: {message}")]
    InternalError { message: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
