//! Structured logging setup.
//!
//! The engine logs through `tracing`; this module installs the subscriber
//! that renders those events, as pretty text for development or as one JSON
//! object per line:
//!
//! ```json
//! {"timestamp":"...","level":"INFO","fields":{"message":"permission written","subject_id":1,"resource_id":2,"access":"Allow"},"target":"treeacl_domain::resolver::mutation"}
//! ```
//!
//! `RUST_LOG` takes precedence over the configured level.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::config::{ConfigLoadError, LoggingSettings};

/// Configuration for structured logging.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Whether to use JSON format (true) or text format (false)
    pub json_format: bool,
    /// The default log level if RUST_LOG is not set
    pub default_level: Level,
    /// Whether to include span events (enter/exit)
    pub include_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json_format: false,
            default_level: Level::INFO,
            include_spans: false,
        }
    }
}

impl LoggingConfig {
    pub fn json() -> Self {
        Self {
            json_format: true,
            ..Default::default()
        }
    }

    pub fn text() -> Self {
        Self {
            json_format: false,
            ..Default::default()
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Include span enter/exit events in the output.
    pub fn with_spans(mut self) -> Self {
        self.include_spans = true;
        self
    }

    /// Builds the logging configuration from the `logging` config section.
    pub fn from_settings(settings: &LoggingSettings) -> Result<Self, ConfigLoadError> {
        let level = Level::from_str(&settings.level).map_err(|_| ConfigLoadError::Invalid {
            message: format!("unknown log level: {}", settings.level),
        })?;
        let config = if settings.json {
            Self::json()
        } else {
            Self::text()
        };
        Ok(config.with_level(level))
    }
}

/// Installs the global subscriber.
///
/// Call once at startup. Later calls leave the first subscriber in place.
pub fn init_logging(config: LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_level.to_string()));

    let span_events = if config.include_spans {
        FmtSpan::ENTER | FmtSpan::EXIT
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_span_events(span_events)
                .with_current_span(true)
                .with_target(true)
                .with_file(false)
                .with_line_number(false),
        );
        let _ = tracing::subscriber::set_global_default(subscriber);
    } else {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .pretty()
                .with_span_events(span_events)
                .with_target(true),
        );
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

/// JSON subscriber writing every event to `writer`, for capturing logs.
pub fn json_subscriber<W>(writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'writer> fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::registry().with(EnvFilter::new("trace")).with(
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_current_span(true),
    )
}
