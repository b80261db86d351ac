//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! # Example
//!
//! ```rust,ignore
//! use meteor_runtime::logging::LoggingBuilder;
//!
//! LoggingBuilder::new().with_level_str("debug").init();
//! ```

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Builds and installs the global tracing subscriber.
///
/// Initialization is idempotent: later calls are no-ops so embedded and
/// test usage cannot panic on double installation.
pub struct LoggingBuilder {
    level: Level,
    directive: Option<String>,
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self {
            level: Level::INFO,
            directive: None,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Parses a level name (`trace`..`error`); unknown names fall back to
    /// `info`.
    pub fn with_level_str(self, level: &str) -> Self {
        let parsed = match level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" | "warning" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        self.with_level(parsed)
    }

    /// A full `EnvFilter` directive, e.g. `meteor=debug,hyper=warn`.
    /// Takes precedence over the level.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = Some(directive.into());
        self
    }

    /// Installs the subscriber. Returns whether this call installed it.
    pub fn init(self) -> bool {
        let filter = match &self.directive {
            Some(directive) => {
                EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
            }
            None => EnvFilter::new(self.level.as_str()),
        };

        #[cfg(feature = "json-log")]
        let layer = fmt::layer().with_target(false).json();
        #[cfg(not(feature = "json-log"))]
        let layer = fmt::layer().with_target(false);

        tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .try_init()
            .is_ok()
    }
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}
