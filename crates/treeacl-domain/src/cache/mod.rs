//! Check result caching with TTL.
//!
//! This module provides the access-result cache used by `check`, built on
//! Moka's async cache for concurrent access with TTL-based eviction.
//!
//! # Key Design
//!
//! Cache keys are `(subject_id, resource_id, action)` after both references
//! have been resolved, so different spellings of the same node share an entry.
//!
//! # Cache Safety
//!
//! Unlike the node caches, a cached decision depends on rows anywhere in the
//! ancestor closure of both nodes. The engine therefore drops the whole cache
//! after every successful mutation it performs. Writes made directly to the
//! store, bypassing the engine, stay invisible until the TTL expires.
//!
//! # Example
//!
//! ```rust,ignore
//! use treeacl_domain::cache::{CacheKey, CheckCache, CheckCacheConfig};
//! use treeacl_storage::NodeId;
//!
//! let cache = CheckCache::new(CheckCacheConfig::default());
//! let key = CacheKey::new(NodeId(1), NodeId(2), None);
//! cache.insert(key.clone(), true).await;
//!
//! assert_eq!(cache.get(&key).await, Some(true));
//! ```

use std::time::Duration;

use moka::future::Cache;
use treeacl_storage::NodeId;

/// Configuration for the check cache.
#[derive(Debug, Clone)]
pub struct CheckCacheConfig {
    /// Whether caching is enabled.
    pub enabled: bool,
    /// Maximum number of entries in the cache.
    pub max_capacity: u64,
    /// Default TTL for cache entries.
    pub default_ttl: Duration,
}

impl Default for CheckCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_capacity: 100_000,
            default_ttl: Duration::from_secs(60),
        }
    }
}

impl CheckCacheConfig {
    /// Enables or disables caching.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the maximum capacity.
    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Sets the default TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
}

/// Cache key that uniquely identifies a check operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub subject_id: NodeId,
    pub resource_id: NodeId,
    /// The action checked under the resource, if any.
    pub action: Option<String>,
}

impl CacheKey {
    /// Creates a new cache key.
    pub fn new(subject_id: NodeId, resource_id: NodeId, action: Option<&str>) -> Self {
        Self {
            subject_id,
            resource_id,
            action: action.map(str::to_string),
        }
    }
}

/// Check result cache with TTL support.
///
/// # Thread Safety
///
/// This cache is fully thread-safe and can be shared across multiple
/// async tasks without external synchronization.
#[derive(Clone)]
pub struct CheckCache {
    cache: Cache<CacheKey, bool>,
    config: CheckCacheConfig,
}

impl std::fmt::Debug for CheckCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckCache")
            .field("config", &self.config)
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl CheckCache {
    /// Creates a new check cache with the given configuration.
    pub fn new(config: CheckCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.default_ttl)
            .build();

        Self { cache, config }
    }

    /// Returns the configuration for this cache.
    pub fn config(&self) -> &CheckCacheConfig {
        &self.config
    }

    /// Returns whether caching is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Inserts a check result into the cache.
    pub async fn insert(&self, key: CacheKey, allowed: bool) {
        if !self.config.enabled {
            return;
        }
        self.cache.insert(key, allowed).await;
    }

    /// Retrieves a cached check result.
    ///
    /// Returns `None` if the key is not in the cache, has expired, or
    /// caching is disabled.
    ///
    /// # Metrics
    ///
    /// - `treeacl_check_cache_hits_total` - Incremented on cache hit
    /// - `treeacl_check_cache_misses_total` - Incremented on cache miss
    pub async fn get(&self, key: &CacheKey) -> Option<bool> {
        if !self.config.enabled {
            return None;
        }
        let result = self.cache.get(key).await;
        if result.is_some() {
            metrics::counter!("treeacl_check_cache_hits_total").increment(1);
        } else {
            metrics::counter!("treeacl_check_cache_misses_total").increment(1);
        }
        result
    }

    /// Invalidates a single cache entry.
    pub async fn invalidate(&self, key: &CacheKey) {
        self.cache.invalidate(key).await;
    }

    /// Invalidates every entry.
    ///
    /// Entries become invisible to `get` immediately; memory is reclaimed
    /// by Moka's maintenance tasks.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Returns the approximate number of entries in the cache.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Runs pending maintenance tasks.
    ///
    /// This triggers any pending evictions. Useful for testing TTL behavior.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

/// Registers check cache metrics descriptions.
///
/// Call once during application startup, after installing a metrics recorder.
pub fn register_check_cache_metrics() {
    metrics::describe_counter!(
        "treeacl_check_cache_hits_total",
        "Total number of check cache hits"
    );
    metrics::describe_counter!(
        "treeacl_check_cache_misses_total",
        "Total number of check cache misses"
    );
}
