//! Configuration for the access engine.

use std::sync::Arc;

use crate::cache::CheckCache;

/// Default `model` value marking a resource node as an action node.
pub const DEFAULT_ACTION_MODEL: &str = "acl_action";

/// Default bound on ancestor walks.
pub const DEFAULT_MAX_DEPTH: u32 = 64;

/// Configuration for the access engine.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum number of ancestors visited per walk, the node itself included.
    pub max_depth: u32,
    /// `model` value stored on action nodes.
    pub action_model: String,
    /// Optional check result cache.
    ///
    /// When present, `check` consults it before walking and stores the
    /// decision afterwards. Every mutation made through the engine clears it.
    pub cache: Option<Arc<CheckCache>>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            action_model: DEFAULT_ACTION_MODEL.to_string(),
            cache: None,
        }
    }
}

impl ResolverConfig {
    /// Creates a new configuration with caching enabled.
    pub fn with_cache(mut self, cache: Arc<CheckCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Creates a new configuration with the specified max depth.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Creates a new configuration with the specified action marker.
    pub fn with_action_model(mut self, action_model: impl Into<String>) -> Self {
        self.action_model = action_model.into();
        self
    }
}
