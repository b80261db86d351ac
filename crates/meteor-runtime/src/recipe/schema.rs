//! Recipe schema definitions.
//!
//! ```yaml
//! name: warehouse-metadata
//! source:
//!   name: csv
//!   config:
//!     path: ./fixtures
//! processors:
//!   - name: enrich
//!     config:
//!       labels:
//!         env: production
//! sinks:
//!   - name: console
//! ```

use serde::{Deserialize, Serialize};

use meteor_core::{Config, Position};

/// A reference to one plugin inside a recipe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginRef {
    /// Registered plugin name.
    pub name: String,
    /// Free-form configuration handed to the plugin.
    pub config: Config,
    /// Where the reference's `name` key sits in the source document.
    /// Filled by the reader, not part of the document itself.
    #[serde(skip)]
    pub position: Option<Position>,
}

impl PluginRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Config::new(),
            position: None,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// The line of the reference, for attaching to plugin errors.
    pub fn position(&self) -> Option<Position> {
        self.position
    }
}

/// One declarative pipeline: source, processors, sinks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Recipe {
    /// Recipe name; used in run URNs and metric labels.
    pub name: String,
    pub source: PluginRef,
    pub processors: Vec<PluginRef>,
    pub sinks: Vec<PluginRef>,
}
