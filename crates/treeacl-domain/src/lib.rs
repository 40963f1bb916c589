//! treeacl-domain: access resolution over subject and resource trees
//!
//! This crate contains the access logic:
//! - Node references and grants
//! - The access engine (identity resolution, ancestor walks, checks, mutations)
//! - Check result caching
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               treeacl-domain                │
//! ├─────────────────────────────────────────────┤
//! │  model/     - Node references & grants      │
//! │  resolver/  - Access engine                 │
//! │  cache/     - Check result caching          │
//! └─────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod model;
pub mod resolver;

// Re-export commonly used types at the crate root
pub use cache::{CacheKey, CheckCache, CheckCacheConfig};
pub use error::{DomainError, DomainResult};
pub use model::{Grant, NodeRef, PairAccess};
pub use resolver::{AclEngine, ResolverConfig};
