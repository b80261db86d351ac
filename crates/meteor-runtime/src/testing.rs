//! Shared fake plugins and observers for runtime tests.
//!
//! Fakes are constructed through cloneable handles so a test can register
//! a factory with the registry and still observe what the constructed
//! instances did after the run finished.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use meteor_core::{
    Asset, AssetData, Config, Emitter, Extractor, Plugin, PluginContext, PluginError, PluginInfo,
    Processor, Record, Sink, TableData,
};

use crate::agent::Run;
use crate::metrics::Monitor;

fn table_asset(urn: &str) -> Asset {
    Asset::new(urn, urn, "fake", AssetData::Table(TableData::default()))
}

// =============================================================================
// Shared counters
// =============================================================================

/// Counters shared between a test and the plugin instances it spawned.
#[derive(Clone, Default)]
pub struct CountersHandle {
    extractor_closes: Arc<AtomicUsize>,
    processor_closes: Arc<AtomicUsize>,
    processed: Arc<AtomicUsize>,
}

impl CountersHandle {
    pub fn extractor_closes(&self) -> usize {
        self.extractor_closes.load(Ordering::SeqCst)
    }

    pub fn processor_closes(&self) -> usize {
        self.processor_closes.load(Ordering::SeqCst)
    }

    /// Total records that passed through a [`TagProcessor`].
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Fake extractor
// =============================================================================

/// Emits a fixed list of table assets.
#[derive(Default)]
pub struct FakeExtractor {
    urns: Vec<String>,
    fail_init: bool,
    counters: CountersHandle,
}

impl FakeExtractor {
    pub fn emitting(urns: &[&str], counters: CountersHandle) -> Self {
        Self::emitting_strings(urns.iter().map(|urn| urn.to_string()).collect(), counters)
    }

    pub fn emitting_strings(urns: Vec<String>, counters: CountersHandle) -> Self {
        Self {
            urns,
            fail_init: false,
            counters,
        }
    }

    pub fn failing_init(counters: CountersHandle) -> Self {
        Self {
            urns: Vec::new(),
            fail_init: true,
            counters,
        }
    }
}

#[async_trait]
impl Plugin for FakeExtractor {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            description: "emits a fixed list of table assets".into(),
            ..PluginInfo::default()
        }
    }

    fn validate(&self, _config: &Config) -> Result<(), PluginError> {
        Ok(())
    }

    async fn init(&mut self, _ctx: &PluginContext, _config: Config) -> Result<(), PluginError> {
        if self.fail_init {
            return Err(PluginError::extract_failed("init exploded"));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PluginError> {
        self.counters.extractor_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(&mut self, _ctx: &PluginContext, emit: &Emitter) -> Result<(), PluginError> {
        for urn in &self.urns {
            emit.emit(table_asset(urn)).await?;
        }
        Ok(())
    }
}

// =============================================================================
// Tag processor
// =============================================================================

/// Adds one label to every asset; can be told to reject after N records.
pub struct TagProcessor {
    key: String,
    value: String,
    reject_after: Option<usize>,
    seen: usize,
    counters: CountersHandle,
}

impl TagProcessor {
    pub fn new(key: &str, value: &str, counters: CountersHandle) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            reject_after: None,
            seen: 0,
            counters,
        }
    }

    /// Processes `accepted` records, then fails on the next one.
    pub fn rejecting_after(accepted: usize, counters: CountersHandle) -> Self {
        Self {
            reject_after: Some(accepted),
            ..Self::new("env", "prod", counters)
        }
    }
}

#[async_trait]
impl Plugin for TagProcessor {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            description: "adds a fixed label".into(),
            ..PluginInfo::default()
        }
    }

    fn validate(&self, _config: &Config) -> Result<(), PluginError> {
        Ok(())
    }

    async fn init(&mut self, _ctx: &PluginContext, _config: Config) -> Result<(), PluginError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PluginError> {
        self.counters.processor_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Processor for TagProcessor {
    async fn process(
        &mut self,
        _ctx: &PluginContext,
        record: Record,
    ) -> Result<Record, PluginError> {
        if let Some(accepted) = self.reject_after {
            if self.seen >= accepted {
                return Err(PluginError::process_failed("tag", "record rejected"));
            }
        }
        self.seen += 1;
        self.counters.processed.fetch_add(1, Ordering::SeqCst);

        let mut asset = record.into_asset();
        asset.labels.insert(self.key.clone(), self.value.clone());
        Ok(Record::new(asset))
    }
}

// =============================================================================
// In-memory sink
// =============================================================================

#[derive(Default)]
struct MemSinkState {
    records: Mutex<Vec<Record>>,
    batches: Mutex<Vec<Vec<String>>>,
    sink_calls: AtomicUsize,
    closes: AtomicUsize,
    remaining_retryable_failures: AtomicUsize,
    fatal: bool,
    fail_init: bool,
}

/// Handle for building and inspecting [`MemSink`] instances.
#[derive(Clone, Default)]
pub struct MemSinkHandle {
    state: Arc<MemSinkState>,
}

impl MemSinkHandle {
    /// The first `count` deliveries fail with a retryable error.
    pub fn with_retryable_failures(self, count: usize) -> Self {
        self.state
            .remaining_retryable_failures
            .store(count, Ordering::SeqCst);
        self
    }

    /// Every delivery fails fatally.
    pub fn with_fatal_failure(mut self) -> Self {
        Arc::get_mut(&mut self.state)
            .expect("configure the handle before cloning it")
            .fatal = true;
        self
    }

    /// `init` fails, aborting the run before extraction.
    pub fn with_failing_init(mut self) -> Self {
        Arc::get_mut(&mut self.state)
            .expect("configure the handle before cloning it")
            .fail_init = true;
        self
    }

    /// A fresh sink instance sharing this handle's state.
    pub fn sink(&self) -> MemSink {
        MemSink {
            state: self.state.clone(),
        }
    }

    pub fn records(&self) -> Vec<Record> {
        self.state.records.lock().unwrap().clone()
    }

    pub fn urns(&self) -> Vec<String> {
        self.records()
            .iter()
            .map(|record| record.asset().urn.clone())
            .collect()
    }

    /// URNs of every delivered batch, including failed attempts.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.state.batches.lock().unwrap().clone()
    }

    pub fn sink_calls(&self) -> usize {
        self.state.sink_calls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }
}

/// Appends accepted records to an in-memory list.
#[derive(Default)]
pub struct MemSink {
    state: Arc<MemSinkState>,
}

#[async_trait]
impl Plugin for MemSink {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            description: "appends records to an in-memory list".into(),
            ..PluginInfo::default()
        }
    }

    fn validate(&self, _config: &Config) -> Result<(), PluginError> {
        Ok(())
    }

    async fn init(&mut self, _ctx: &PluginContext, _config: Config) -> Result<(), PluginError> {
        if self.state.fail_init {
            return Err(PluginError::sink_failed("mem", "init exploded"));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PluginError> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Sink for MemSink {
    async fn sink(&mut self, _ctx: &PluginContext, batch: &[Record]) -> Result<(), PluginError> {
        self.state.sink_calls.fetch_add(1, Ordering::SeqCst);
        self.state.batches.lock().unwrap().push(
            batch
                .iter()
                .map(|record| record.asset().urn.clone())
                .collect(),
        );

        if self.state.fatal {
            return Err(PluginError::sink_failed("mem", "unrecoverable failure"));
        }

        let remaining = &self.state.remaining_retryable_failures;
        if remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |value| {
                value.checked_sub(1)
            })
            .is_ok()
        {
            return Err(PluginError::retryable(PluginError::sink_failed(
                "mem",
                "simulated 503",
            )));
        }

        self.state.records.lock().unwrap().extend_from_slice(batch);
        Ok(())
    }
}

// =============================================================================
// Recording monitor
// =============================================================================

/// Captures every `record_run` call as `(recipe, success, record_count)`.
#[derive(Default)]
pub struct RecordingMonitor {
    runs: Mutex<Vec<(String, bool, usize)>>,
}

impl RecordingMonitor {
    pub fn runs(&self) -> Vec<(String, bool, usize)> {
        self.runs.lock().unwrap().clone()
    }
}

impl Monitor for RecordingMonitor {
    fn record_run(&self, run: &Run) {
        self.runs
            .lock()
            .unwrap()
            .push((run.recipe.clone(), run.success, run.record_count));
    }
}
