//! Plugin contracts: the capabilities, their shared lifecycle, and the
//! emit handle given to extractors.
//!
//! All three capabilities share the lifecycle triplet `info` / `validate` /
//! `init`, plus `close`. The agent constructs a fresh instance per run via
//! the registry, drives the lifecycle, and guarantees `close` runs exactly
//! once for every initialized instance.
//!
//! ```text
//! Extractor --emit--> [Processor]* --fanout--> { Sink, ... }
//! ```
//!
//! The source-side contract is push: the extractor receives an [`Emitter`]
//! and calls [`Emitter::emit`] for every asset it finds. Backpressure is
//! the emitter blocking; cancellation surfaces as [`PluginError::Cancelled`]
//! at the next emit boundary.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::asset::Asset;
use crate::error::PluginError;
use crate::record::Record;

// =============================================================================
// Plugin Config
// =============================================================================

/// The free-form configuration block of one plugin reference in a recipe.
///
/// Plugins extract their typed configuration from it during `validate` and
/// `init`:
///
/// ```rust,ignore
/// #[derive(Deserialize)]
/// struct FileSinkConfig {
///     path: String,
/// }
///
/// let config: FileSinkConfig = raw.extract()?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config(serde_yaml::Mapping);

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_yaml::Value) {
        self.0.insert(serde_yaml::Value::String(key.into()), value);
    }

    /// Iterates over the raw entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&serde_yaml::Value, &serde_yaml::Value)> {
        self.0.iter()
    }

    /// Deserializes the whole block into a typed config struct.
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T, serde_yaml::Error> {
        serde_yaml::from_value(serde_yaml::Value::Mapping(self.0.clone()))
    }
}

impl From<serde_yaml::Mapping> for Config {
    fn from(mapping: serde_yaml::Mapping) -> Self {
        Self(mapping)
    }
}

// =============================================================================
// Plugin Info
// =============================================================================

/// Discovery and documentation metadata exposed by every plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginInfo {
    /// One-line description, shown in listings.
    pub description: String,
    /// A commented YAML snippet of the plugin's configuration.
    pub sample_config: String,
    /// Longer usage notes.
    pub summary: String,
    /// Free-form tags, e.g. `["file", "sink"]`.
    pub tags: Vec<String>,
}

// =============================================================================
// Plugin Context
// =============================================================================

/// Per-run context handed to every lifecycle call.
///
/// Carries the recipe name (for logging and URN construction) and the
/// run's cancellation token. Plugins doing I/O should stop at the next
/// convenient point once the token fires.
#[derive(Debug, Clone)]
pub struct PluginContext {
    recipe: String,
    token: CancellationToken,
}

impl PluginContext {
    pub fn new(recipe: impl Into<String>, token: CancellationToken) -> Self {
        Self {
            recipe: recipe.into(),
            token,
        }
    }

    /// The name of the recipe this run executes.
    pub fn recipe(&self) -> &str {
        &self.recipe
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the run is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }
}

// =============================================================================
// Emitter
// =============================================================================

/// Push handle given to an extractor for the duration of one run.
///
/// `emit` blocks while the pipeline is busy (bounded buffer) and fails
/// with [`PluginError::Cancelled`] once the run is cancelled or the
/// downstream stages have shut down. Emission is single-producer: the
/// extractor owns the handle and must not share it across tasks.
pub struct Emitter {
    tx: mpsc::Sender<Record>,
    token: CancellationToken,
    emitted: AtomicUsize,
}

impl Emitter {
    pub fn new(tx: mpsc::Sender<Record>, token: CancellationToken) -> Self {
        Self {
            tx,
            token,
            emitted: AtomicUsize::new(0),
        }
    }

    /// Pushes one asset into the pipeline.
    pub async fn emit(&self, asset: Asset) -> Result<(), PluginError> {
        if asset.urn.is_empty() {
            return Err(PluginError::extract_failed(format!(
                "asset \"{}\" has an empty urn",
                asset.name
            )));
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(PluginError::Cancelled),
            sent = self.tx.send(Record::new(asset)) => match sent {
                Ok(()) => {
                    self.emitted.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(emitted = self.emitted(), "record accepted");
                    Ok(())
                }
                // The receiving stage is gone; the run is winding down.
                Err(_) => Err(PluginError::Cancelled),
            },
        }
    }

    /// Number of records accepted into the pipeline so far.
    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Capabilities
// =============================================================================

/// Lifecycle shared by all plugin capabilities.
#[async_trait]
pub trait Plugin: Send {
    /// Discovery and documentation metadata.
    fn info(&self) -> PluginInfo;

    /// Checks the configuration without side effects. Must be pure: the
    /// agent's `validate` relies on identical inputs producing identical
    /// results.
    fn validate(&self, config: &Config) -> Result<(), PluginError>;

    /// Prepares the plugin for one run. Called exactly once, before any
    /// other pipeline call.
    async fn init(&mut self, ctx: &PluginContext, config: Config) -> Result<(), PluginError>;

    /// Releases resources and flushes buffers. Called exactly once for
    /// every initialized instance, on success, failure, and cancellation
    /// alike.
    async fn close(&mut self) -> Result<(), PluginError> {
        Ok(())
    }
}

/// A source of assets.
#[async_trait]
pub trait Extractor: Plugin {
    /// Scans the external system and pushes every asset through `emit`.
    /// Returns when the scan completes or on the first fatal error.
    async fn extract(&mut self, ctx: &PluginContext, emit: &Emitter) -> Result<(), PluginError>;
}

/// A per-record transform.
#[async_trait]
pub trait Processor: Plugin {
    /// Transforms one record. Must return a record (possibly the input,
    /// untouched); dropping records is only possible by returning an
    /// error, which aborts the run.
    async fn process(&mut self, ctx: &PluginContext, record: Record)
    -> Result<Record, PluginError>;
}

/// A destination for assets.
#[async_trait]
pub trait Sink: Plugin {
    /// Delivers an ordered batch of records. The runtime may call this
    /// again with the same batch after a retryable failure, so delivery
    /// must tolerate replays.
    async fn sink(&mut self, ctx: &PluginContext, batch: &[Record]) -> Result<(), PluginError>;
}

impl std::fmt::Debug for dyn Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn Sink").field("info", &self.info()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetData, TableData};

    fn table_asset(urn: &str) -> Asset {
        Asset::new(urn, "t", "test", AssetData::Table(TableData::default()))
    }

    #[tokio::test]
    async fn emit_counts_accepted_records() {
        let (tx, mut rx) = mpsc::channel(4);
        let emitter = Emitter::new(tx, CancellationToken::new());

        emitter.emit(table_asset("a")).await.unwrap();
        emitter.emit(table_asset("b")).await.unwrap();

        assert_eq!(emitter.emitted(), 2);
        assert_eq!(rx.recv().await.unwrap().asset().urn, "a");
        assert_eq!(rx.recv().await.unwrap().asset().urn, "b");
    }

    #[tokio::test]
    async fn emit_rejects_empty_urn() {
        let (tx, _rx) = mpsc::channel(1);
        let emitter = Emitter::new(tx, CancellationToken::new());

        let err = emitter
            .emit(Asset::new("", "t", "test", AssetData::Table(TableData::default())))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::ExtractFailed { .. }));
        assert_eq!(emitter.emitted(), 0);
    }

    #[tokio::test]
    async fn emit_fails_once_cancelled() {
        let (tx, _rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let emitter = Emitter::new(tx, token.clone());

        token.cancel();
        let err = emitter.emit(table_asset("a")).await.unwrap_err();
        assert!(matches!(err, PluginError::Cancelled));
    }

    #[tokio::test]
    async fn emit_fails_when_pipeline_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let emitter = Emitter::new(tx, CancellationToken::new());

        let err = emitter.emit(table_asset("a")).await.unwrap_err();
        assert!(matches!(err, PluginError::Cancelled));
    }

    #[test]
    fn config_extracts_typed_structs() {
        #[derive(Deserialize)]
        struct FileConfig {
            path: String,
            #[serde(default)]
            overwrite: bool,
        }

        let mut config = Config::new();
        config.insert("path", serde_yaml::Value::String("/tmp/out.json".into()));

        let typed: FileConfig = config.extract().unwrap();
        assert_eq!(typed.path, "/tmp/out.json");
        assert!(!typed.overwrite);
    }
}
