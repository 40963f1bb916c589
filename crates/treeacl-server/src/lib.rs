//! treeacl-server: configuration and wiring for the access engine
//!
//! This crate turns configuration into a ready engine:
//! - Configuration management (defaults, YAML file, environment)
//! - Logging initialisation
//! - Engine construction over the in-memory backend
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               treeacl-server                │
//! ├─────────────────────────────────────────────┤
//! │  config.rs        - Configuration loading   │
//! │  engine.rs        - Engine construction     │
//! │  observability.rs - Structured logging      │
//! └─────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod engine;
pub mod observability;

// Re-exports for convenience
pub use config::{AclConfig, ConfigLoadError};
pub use engine::MemoryEngine;
pub use observability::{init_logging, LoggingConfig};
