//! treeacl-storage: Storage abstraction layer
//!
//! This crate provides the storage abstraction for treeacl, including:
//! - NodeStore trait for the subject and resource trees
//! - PermissionStore trait for (subject, resource) access rows
//! - In-memory implementation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              treeacl-storage                │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs - Store traits & record types    │
//! │  memory.rs - In-memory implementation       │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use traits::{
    Access, NodeFields, NodeId, NodeMatch, NodeStore, PermissionEntry, PermissionFilter,
    PermissionStore, TreeKind, TreeNode,
};
