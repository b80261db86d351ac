//! # Meteor
//!
//! A plugin-driven metadata collection agent.
//!
//! Meteor reads declarative recipes describing where to pull metadata
//! from (a *source*), how to transform it (*processors*), and where to
//! deliver it (*sinks*), then executes each recipe as a streaming
//! pipeline:
//!
//! ```text
//! ┌────────┐    ┌────────────┐    ┌────────┐    ┌───────────────┐
//! │ source │───▶│ processors │───▶│ fanout │───▶│ sink, sink, … │
//! └────────┘    └────────────┘    └────────┘    └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use meteor::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = Registry::new();
//!     meteor::plugins::register_all(&mut registry)?;
//!
//!     let recipes = RecipeReader::new().read("./recipes")?;
//!     let agent = Agent::new(Arc::new(registry));
//!
//!     let failed = agent
//!         .run_multiple(&CancellationToken::new(), &recipes)
//!         .await?;
//!     println!("failed recipes: {failed:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Crates
//!
//! - `meteor-core`: plugin contracts and the asset model
//! - `meteor-runtime`: registry, recipe reader, agent, retry, metrics
//! - `meteor-plugins`: the reference csv/enrich/console/file/http plugins

// Contracts and the asset model
pub use meteor_core::*;

// Execution runtime
pub use meteor_runtime;

// Reference plugins
pub use meteor_plugins as plugins;

/// Prelude module for convenient imports.
pub mod prelude {
    // Runtime - main entry points
    pub use meteor_runtime::{Agent, AgentBuilder, Registry, Run};

    // Recipes
    pub use meteor_runtime::{Recipe, RecipeReader};

    // Observability
    pub use meteor_runtime::{LoggingBuilder, Monitor, StatsdMonitor};

    // Contracts for plugin authors
    pub use meteor_core::{
        Asset, AssetData, Config, Emitter, Extractor, Plugin, PluginContext, PluginError,
        PluginInfo, Processor, Record, Sink,
    };
}
