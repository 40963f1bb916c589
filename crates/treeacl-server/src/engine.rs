//! Engine construction from configuration.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use treeacl_domain::cache::register_check_cache_metrics;
use treeacl_domain::{AclEngine, CheckCache, CheckCacheConfig, ResolverConfig};
use treeacl_storage::MemoryStore;

use crate::config::AclConfig;

/// Engine over the in-memory backend, one store serving both roles.
pub type MemoryEngine = AclEngine<MemoryStore, MemoryStore>;

impl AclConfig {
    /// Check cache settings, or `None` when caching is disabled.
    pub fn check_cache_config(&self) -> Option<CheckCacheConfig> {
        self.cache.enabled.then(|| {
            CheckCacheConfig::default()
                .with_max_capacity(self.cache.max_capacity)
                .with_ttl(Duration::from_secs(self.cache.ttl_secs))
        })
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        let config = ResolverConfig::default()
            .with_max_depth(self.resolver.max_depth)
            .with_action_model(self.resolver.action_model.trim());
        match self.check_cache_config() {
            Some(cache) => {
                register_check_cache_metrics();
                config.with_cache(Arc::new(CheckCache::new(cache)))
            }
            None => config,
        }
    }

    /// Builds an engine over a fresh in-memory store.
    pub fn build_engine(&self) -> MemoryEngine {
        let store = MemoryStore::new_shared();
        self.build_engine_with(store)
    }

    /// Builds an engine over an existing in-memory store.
    pub fn build_engine_with(&self, store: Arc<MemoryStore>) -> MemoryEngine {
        let resolver = self.resolver_config();
        info!(
            backend = %self.storage.backend,
            max_depth = resolver.max_depth,
            action_model = %resolver.action_model,
            cache = resolver.cache.is_some(),
            "building access engine"
        );
        AclEngine::with_config(Arc::clone(&store), store, resolver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_cache_builds_engine_without_cache() {
        let mut config = AclConfig::default();
        config.cache.enabled = false;

        assert!(config.check_cache_config().is_none());
        assert!(config.build_engine().check_cache().is_none());
    }

    #[test]
    fn test_resolver_settings_reach_the_engine() {
        let mut config = AclConfig::default();
        config.resolver.max_depth = 7;
        config.resolver.action_model = "operation".to_string();
        config.cache.ttl_secs = 3;

        let engine = config.build_engine();
        assert_eq!(engine.config().max_depth, 7);
        assert_eq!(engine.config().action_model, "operation");
        let cache = engine.check_cache().unwrap();
        assert_eq!(cache.config().default_ttl, Duration::from_secs(3));
    }
}
