//! Unified error taxonomy for Meteor plugins and runs.
//!
//! Every plugin capability reports failures through [`PluginError`]. The
//! variants are semantic: the agent decides what to do with an error based
//! on its variant, not on its message. Sinks mark transient failures with
//! [`PluginError::retryable`]; the runtime owns the retry policy.

use std::fmt;

use thiserror::Error;

// =============================================================================
// Plugin Kind
// =============================================================================

/// The three plugin capabilities known to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    /// Produces assets from an external system.
    Extractor,
    /// Transforms assets in flight.
    Processor,
    /// Delivers assets to an external destination.
    Sink,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Extractor => "extractor",
            Self::Processor => "processor",
            Self::Sink => "sink",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Recipe Position
// =============================================================================

/// A position inside a recipe document, attached to lookup and config
/// errors so diagnostics can point into the file. Lines and columns are
/// 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// =============================================================================
// Plugin Error
// =============================================================================

/// Errors produced by plugins and by the agent while driving them.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// Registry lookup failed.
    #[error("could not find {kind} \"{name}\"")]
    NotFound {
        /// Capability that was looked up.
        kind: PluginKind,
        /// Name used for the lookup.
        name: String,
        /// Where the recipe referenced the plugin, if known.
        position: Option<Position>,
    },

    /// Plugin-level validation rejected the configuration.
    #[error("invalid {kind} \"{name}\" config: {cause}")]
    InvalidConfig {
        kind: PluginKind,
        name: String,
        position: Option<Position>,
        cause: String,
    },

    /// `init` returned an error; the run aborts before extraction.
    #[error("failed to initialize {kind} \"{name}\": {cause}")]
    InitFailed {
        kind: PluginKind,
        name: String,
        cause: String,
    },

    /// The source failed mid-extraction.
    #[error("extract failed: {cause}")]
    ExtractFailed { cause: String },

    /// A processor rejected a record.
    #[error("processor \"{name}\" failed: {cause}")]
    ProcessFailed { name: String, cause: String },

    /// A sink failed fatally, or exhausted its retries.
    #[error("sink \"{name}\" failed: {cause}")]
    SinkFailed { name: String, cause: String },

    /// Wraps another error to signal that the runtime may retry the same
    /// batch. Only meaningful on sink results.
    #[error("{0}")]
    Retryable(Box<PluginError>),

    /// Propagated from context cancellation.
    #[error("run cancelled")]
    Cancelled,
}

impl PluginError {
    /// A registry miss without position information.
    pub fn not_found(kind: PluginKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
            position: None,
        }
    }

    /// A config rejection reported by a plugin's `validate` or `init`.
    pub fn invalid_config(
        kind: PluginKind,
        name: impl Into<String>,
        cause: impl fmt::Display,
    ) -> Self {
        Self::InvalidConfig {
            kind,
            name: name.into(),
            position: None,
            cause: cause.to_string(),
        }
    }

    pub fn init_failed(kind: PluginKind, name: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::InitFailed {
            kind,
            name: name.into(),
            cause: cause.to_string(),
        }
    }

    pub fn extract_failed(cause: impl fmt::Display) -> Self {
        Self::ExtractFailed {
            cause: cause.to_string(),
        }
    }

    pub fn process_failed(name: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::ProcessFailed {
            name: name.into(),
            cause: cause.to_string(),
        }
    }

    pub fn sink_failed(name: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::SinkFailed {
            name: name.into(),
            cause: cause.to_string(),
        }
    }

    /// Marks an error as retryable. Already-retryable errors are returned
    /// unchanged so the marker never nests.
    pub fn retryable(err: PluginError) -> Self {
        match err {
            retryable @ Self::Retryable(_) => retryable,
            other => Self::Retryable(Box::new(other)),
        }
    }

    /// True when the runtime is allowed to retry the failed call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    /// Unwraps the retryable marker, if present.
    pub fn into_inner(self) -> PluginError {
        match self {
            Self::Retryable(inner) => *inner,
            other => other,
        }
    }

    /// The recipe position attached to the error, if any.
    pub fn position(&self) -> Option<Position> {
        match self {
            Self::NotFound { position, .. } | Self::InvalidConfig { position, .. } => *position,
            _ => None,
        }
    }

    /// Attaches a recipe position to lookup and config errors. Other
    /// variants are returned unchanged.
    pub fn at(self, position: Option<Position>) -> Self {
        match self {
            Self::NotFound { kind, name, .. } => Self::NotFound {
                kind,
                name,
                position,
            },
            Self::InvalidConfig {
                kind, name, cause, ..
            } => Self::InvalidConfig {
                kind,
                name,
                position,
                cause,
            },
            other => other,
        }
    }
}
