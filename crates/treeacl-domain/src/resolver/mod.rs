//! Access resolution over subject and resource trees.
//!
//! The engine resolves loose node references, walks ancestor chains and
//! decides access by the first explicit permission found, nearest first.
//!
//! # Architecture Decisions
//!
//! - **Nested walk order**: for each subject ancestor (the subject first),
//!   every resource ancestor is tried before moving up the subject tree.
//!   Subject proximity dominates resource proximity.
//!
//! - **Fail closed**: unknown nodes, missing action nodes and walks that
//!   find nothing all deny.
//!
//! - **Cycle detection**: every walk tracks visited nodes and is bounded by
//!   `max_depth`. Re-parenting refuses to close a loop.
//!
//! - **Consistency**: mutations are serialized by a write lock. Each one
//!   clears the check cache, and structural changes also clear the node
//!   caches of their tree. Concurrent resolutions of the same reference are
//!   collapsed into one store lookup.
//!
//! - **Generations**: each mutation bumps a counter before clearing caches.
//!   Readers capture it before touching the store and only publish into a
//!   cache if no mutation finished in between.

mod actions;
mod check;
mod config;
mod context;
mod hierarchy;
mod identity;
mod mutation;
mod report;
mod singleflight;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use treeacl_storage::{NodeFields, NodeStore, PermissionStore, TreeKind};

use crate::cache::CheckCache;

pub use config::{ResolverConfig, DEFAULT_ACTION_MODEL, DEFAULT_MAX_DEPTH};
pub use report::{ActionEntry, NodeInfo, TreeEntry};

use identity::NodeCache;
use singleflight::Singleflight;

/// Key of an in-flight resolution.
type ResolveKey = (TreeKind, NodeFields, bool);

/// The access engine.
///
/// Holds the two stores, the node caches and an optional check cache.
/// Share it behind an `Arc`; every method takes `&self`.
pub struct AclEngine<N, P> {
    nodes: Arc<N>,
    permissions: Arc<P>,
    config: ResolverConfig,
    node_cache: NodeCache,
    resolving: Singleflight<ResolveKey>,
    write_lock: Mutex<()>,
    generation: AtomicU64,
}

impl<N, P> AclEngine<N, P>
where
    N: NodeStore,
    P: PermissionStore,
{
    /// Creates an engine with the default configuration and no check cache.
    pub fn new(nodes: Arc<N>, permissions: Arc<P>) -> Self {
        Self::with_config(nodes, permissions, ResolverConfig::default())
    }

    /// Creates an engine with a custom configuration.
    pub fn with_config(nodes: Arc<N>, permissions: Arc<P>, config: ResolverConfig) -> Self {
        Self {
            nodes,
            permissions,
            config,
            node_cache: NodeCache::default(),
            resolving: Singleflight::new(),
            write_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The check cache, if one is configured.
    pub fn check_cache(&self) -> Option<&Arc<CheckCache>> {
        self.config.cache.as_ref()
    }

    pub fn node_store(&self) -> &Arc<N> {
        &self.nodes
    }

    pub fn permission_store(&self) -> &Arc<P> {
        &self.permissions
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Marks the end of a mutation. Must run before caches are cleared.
    pub(crate) fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl<N, P> std::fmt::Debug for AclEngine<N, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AclEngine")
            .field("config", &self.config)
            .field("node_cache", &self.node_cache)
            .finish_non_exhaustive()
    }
}
