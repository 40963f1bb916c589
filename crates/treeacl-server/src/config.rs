//! Configuration management for the treeacl engine.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use treeacl_server::config::AclConfig;
//!
//! // Load from file with env overrides
//! let config = AclConfig::load("treeacl.yaml")?;
//!
//! // Or load from environment only
//! let config = AclConfig::from_env()?;
//! let engine = config.build_engine();
//! ```

use std::path::Path;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use treeacl_domain::resolver::{DEFAULT_ACTION_MODEL, DEFAULT_MAX_DEPTH};
use treeacl_storage::traits::MAX_MODEL_LENGTH;

/// Prefix of environment overrides, e.g. `TREEACL_RESOLVER__MAX_DEPTH`.
const ENV_PREFIX: &str = "TREEACL";

/// Engine configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AclConfig {
    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub resolver: ResolverSettings,

    /// Check result cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StorageSettings {
    /// Storage backend type. Only "memory" is available.
    #[serde(default = "default_storage_backend")]
    pub backend: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
        }
    }
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

/// Ancestor walk and action node settings.
///
/// - `TREEACL_RESOLVER__MAX_DEPTH=128` - Allow deeper trees
/// - `TREEACL_RESOLVER__ACTION_MODEL=operation` - Rename the action marker
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ResolverSettings {
    /// Maximum number of nodes visited per ancestor walk.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// `model` value that marks a resource node as an action node.
    #[serde(default = "default_action_model")]
    pub action_model: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            action_model: default_action_model(),
        }
    }
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_action_model() -> String {
    DEFAULT_ACTION_MODEL.to_string()
}

/// Check cache settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CacheSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum number of cached decisions
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,

    /// Time to live of a cached decision, in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_capacity: default_max_capacity(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_capacity() -> u64 {
    100_000
}

fn default_ttl_secs() -> u64 {
    60
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl AclConfig {
    /// Loads configuration from a YAML file with environment overrides.
    ///
    /// Environment variables are prefixed with `TREEACL_` and use `__` as
    /// the nested separator, e.g. `TREEACL_CACHE__ENABLED=false`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&AclConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(env_source())
            .build()?;

        let acl_config: AclConfig = config.try_deserialize()?;
        acl_config.validate()?;
        Ok(acl_config)
    }

    /// Loads configuration from defaults and environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&AclConfig::default())?)
            .add_source(env_source())
            .build()?;

        let acl_config: AclConfig = config.try_deserialize()?;
        acl_config.validate()?;
        Ok(acl_config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let valid_backends = ["memory"];
        if !valid_backends.contains(&self.storage.backend.as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "storage.backend must be one of: {:?}, got: {}",
                    valid_backends, self.storage.backend
                ),
            });
        }

        if self.resolver.max_depth == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "resolver.max_depth must be greater than 0".to_string(),
            });
        }

        let marker = self.resolver.action_model.trim();
        if marker.is_empty() || marker.len() > MAX_MODEL_LENGTH {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "resolver.action_model must be 1 to {MAX_MODEL_LENGTH} characters, got: {:?}",
                    self.resolver.action_model
                ),
            });
        }

        if self.cache.max_capacity == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "cache.max_capacity must be greater than 0".to_string(),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.logging.level
                ),
            });
        }

        Ok(())
    }
}

// TREEACL_CACHE__TTL_SECS -> cache.ttl_secs
fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}
