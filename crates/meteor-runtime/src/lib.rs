//! # Meteor Runtime
//!
//! The execution runtime of the Meteor metadata collection agent.
//!
//! Given a [`Recipe`] and a populated [`Registry`], the [`Agent`] wires a
//! streaming pipeline from the recipe's source through its processors and
//! fans every record out to all of its sinks:
//!
//! ```text
//! Recipe ──▶ Agent::validate ──▶ Agent::run
//!              │                    │
//!              ▼                    ▼
//!          NotFound /        source ─▶ processors ─▶ fanout ─▶ sinks
//!          InvalidConfig            (bounded buffers, one token)
//!                                   │
//!                                   ▼
//!                            Monitor::record_run
//! ```
//!
//! - [`registry`]: named factories, one fresh plugin instance per run
//! - [`recipe`]: the recipe model and its position-preserving reader
//! - [`agent`]: pipeline construction, execution, and run reporting
//! - [`retry`]: bounded exponential backoff applied to sink deliveries
//! - [`metrics`]: the statsd run observer
//! - [`env`], [`logging`]: process-level configuration and log setup

pub mod agent;
pub mod env;
pub mod logging;
pub mod metrics;
pub mod recipe;
pub mod registry;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{Agent, AgentBuilder, AgentError, Run};
pub use env::AgentEnv;
pub use logging::LoggingBuilder;
pub use metrics::{Monitor, MonitorError, StatsdMonitor};
pub use recipe::{PluginRef, Recipe, RecipeError, RecipeReader};
pub use registry::{Registry, RegistryError};
pub use retry::RetryPolicy;
