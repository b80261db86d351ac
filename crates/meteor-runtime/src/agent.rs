//! The agent: builds and executes one pipeline per recipe.
//!
//! # Pipeline
//!
//! ```text
//! ┌────────┐    ┌─────────────┐    ┌────────┐    ┌──────┐
//! │ source │───▶│ processors  │───▶│ fanout │──┬▶│ sink │
//! │  task  │    │ chain task  │    │  task  │  │ └──────┘
//! └────────┘    └─────────────┘    └────────┘  │ ┌──────┐
//!                                              └▶│ sink │
//!                                                └──────┘
//! ```
//!
//! Every stage boundary is a bounded channel (capacity 1 by default), so a
//! slow sink backpressures all the way into the source's `emit` call. The
//! fanout task forwards each record to every sink in turn, which keeps the
//! record sequence identical, and identically ordered, across sinks.
//!
//! A single [`CancellationToken`] covers the run. The first stage to fail
//! fatally cancels it; the source stops at the next emit boundary, sinks
//! finish their current delivery, and every initialized plugin is closed
//! exactly once before the run is reported.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use meteor_core::{
    Config, Emitter, Extractor, PluginContext, PluginError, PluginKind, Processor, Record, Sink,
};

use crate::metrics::Monitor;
use crate::recipe::Recipe;
use crate::registry::Registry;
use crate::retry::RetryPolicy;

// =============================================================================
// Run
// =============================================================================

/// The transient record of one recipe execution.
#[derive(Debug, Clone)]
pub struct Run {
    /// Name of the executed recipe.
    pub recipe: String,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    /// Number of records the source emitted into the pipeline.
    pub record_count: usize,
    pub success: bool,
    pub error: Option<PluginError>,
}

/// Errors about a batch of recipes as a whole; individual recipe failures
/// are reported through [`Run`] instead.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("no recipes to run")]
    NoRecipes,
}

// =============================================================================
// Builder
// =============================================================================

const MIN_CHANNEL_CAPACITY: usize = 1;
const MAX_CHANNEL_CAPACITY: usize = 64;

/// Configures an [`Agent`].
pub struct AgentBuilder {
    registry: Arc<Registry>,
    monitor: Option<Arc<dyn Monitor>>,
    channel_capacity: usize,
    sink_batch_size: usize,
    retry: RetryPolicy,
}

impl AgentBuilder {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            monitor: None,
            channel_capacity: 1,
            sink_batch_size: 1,
            retry: RetryPolicy::default(),
        }
    }

    /// Observer notified once per finished run.
    pub fn monitor(mut self, monitor: Arc<dyn Monitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Capacity of the buffers between stages, clamped to 1..=64.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.clamp(MIN_CHANNEL_CAPACITY, MAX_CHANNEL_CAPACITY);
        self
    }

    /// Records accumulated per `Sink` call. Defaults to 1 (every record is
    /// delivered in its own singleton batch); a partial batch is flushed
    /// when the source completes.
    pub fn sink_batch_size(mut self, size: usize) -> Self {
        self.sink_batch_size = size.max(1);
        self
    }

    /// Overrides the sink retry policy.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn build(self) -> Agent {
        Agent {
            registry: self.registry,
            monitor: self.monitor,
            channel_capacity: self.channel_capacity,
            sink_batch_size: self.sink_batch_size,
            retry: self.retry,
        }
    }
}

// =============================================================================
// Agent
// =============================================================================

/// Coordinates plugin lifecycles and pipeline execution.
pub struct Agent {
    registry: Arc<Registry>,
    monitor: Option<Arc<dyn Monitor>>,
    channel_capacity: usize,
    sink_batch_size: usize,
    retry: RetryPolicy,
}

impl Agent {
    /// An agent with default settings and no monitor.
    pub fn new(registry: Arc<Registry>) -> Self {
        AgentBuilder::new(registry).build()
    }

    pub fn builder(registry: Arc<Registry>) -> AgentBuilder {
        AgentBuilder::new(registry)
    }

    /// Checks every plugin reference of the recipe: the plugin must exist
    /// and accept its configuration. All findings are accumulated, in
    /// recipe order (source, processors, sinks); nothing is executed.
    pub fn validate(&self, recipe: &Recipe) -> Vec<PluginError> {
        let mut errors = Vec::new();

        match self.registry.extractor(&recipe.source.name) {
            Ok(plugin) => {
                if let Err(err) = plugin.validate(&recipe.source.config) {
                    errors.push(config_error(
                        PluginKind::Extractor,
                        &recipe.source.name,
                        err,
                        recipe.source.position,
                    ));
                }
            }
            Err(err) => errors.push(err.at(recipe.source.position)),
        }

        for reference in &recipe.processors {
            match self.registry.processor(&reference.name) {
                Ok(plugin) => {
                    if let Err(err) = plugin.validate(&reference.config) {
                        errors.push(config_error(
                            PluginKind::Processor,
                            &reference.name,
                            err,
                            reference.position,
                        ));
                    }
                }
                Err(err) => errors.push(err.at(reference.position)),
            }
        }

        for reference in &recipe.sinks {
            match self.registry.sink(&reference.name) {
                Ok(plugin) => {
                    if let Err(err) = plugin.validate(&reference.config) {
                        errors.push(config_error(
                            PluginKind::Sink,
                            &reference.name,
                            err,
                            reference.position,
                        ));
                    }
                }
                Err(err) => errors.push(err.at(reference.position)),
            }
        }

        errors
    }

    /// Executes one recipe to completion and reports the outcome. Never
    /// fails as a function: every failure mode ends up inside the
    /// returned [`Run`].
    pub async fn run(&self, token: CancellationToken, recipe: &Recipe) -> Run {
        info!(recipe = %recipe.name, "starting recipe run");
        let started_at = Utc::now();
        let started = Instant::now();

        let (record_count, error) = self.execute(&token, recipe).await;

        let run = Run {
            recipe: recipe.name.clone(),
            started_at,
            duration: started.elapsed(),
            record_count,
            success: error.is_none(),
            error,
        };

        match &run.error {
            None => info!(
                recipe = %run.recipe,
                records = run.record_count,
                duration_ms = run.duration.as_millis() as u64,
                "recipe run finished"
            ),
            Some(err) => error!(
                recipe = %run.recipe,
                records = run.record_count,
                error = %err,
                "recipe run failed"
            ),
        }

        if let Some(monitor) = &self.monitor {
            monitor.record_run(&run);
        }

        run
    }

    /// Runs every recipe sequentially. Individual failures never stop the
    /// batch; the names of failed recipes are returned. Cancelling `token`
    /// cancels the current and all remaining runs.
    pub async fn run_multiple(
        &self,
        token: &CancellationToken,
        recipes: &[Recipe],
    ) -> Result<Vec<String>, AgentError> {
        if recipes.is_empty() {
            return Err(AgentError::NoRecipes);
        }

        let mut failed = Vec::new();
        for recipe in recipes {
            let run = self.run(token.child_token(), recipe).await;
            if !run.success {
                failed.push(run.recipe);
            }
        }
        Ok(failed)
    }

    // -------------------------------------------------------------------------
    // Execution
    // -------------------------------------------------------------------------

    async fn execute(
        &self,
        token: &CancellationToken,
        recipe: &Recipe,
    ) -> (usize, Option<PluginError>) {
        // Resolve every plugin before touching any of them. A lookup miss
        // aborts before init, so nothing needs closing yet.
        let mut extractor = match self.registry.extractor(&recipe.source.name) {
            Ok(plugin) => plugin,
            Err(err) => return (0, Some(err.at(recipe.source.position))),
        };

        let mut processors: Vec<(String, Box<dyn Processor>, Config)> = Vec::new();
        for reference in &recipe.processors {
            match self.registry.processor(&reference.name) {
                Ok(plugin) => {
                    processors.push((reference.name.clone(), plugin, reference.config.clone()));
                }
                Err(err) => return (0, Some(err.at(reference.position))),
            }
        }

        let mut sinks: Vec<(String, Box<dyn Sink>, Config)> = Vec::new();
        for reference in &recipe.sinks {
            match self.registry.sink(&reference.name) {
                Ok(plugin) => {
                    sinks.push((reference.name.clone(), plugin, reference.config.clone()));
                }
                Err(err) => return (0, Some(err.at(reference.position))),
            }
        }

        // Init in pipeline order. On failure, close whatever is already
        // initialized, in reverse order, and abort before extraction.
        let ctx = PluginContext::new(&recipe.name, token.clone());

        if let Err(err) = extractor.init(&ctx, recipe.source.config.clone()).await {
            return (
                0,
                Some(PluginError::init_failed(
                    PluginKind::Extractor,
                    &recipe.source.name,
                    err,
                )),
            );
        }

        for index in 0..processors.len() {
            let config = processors[index].2.clone();
            if let Err(err) = processors[index].1.init(&ctx, config).await {
                let failed = PluginError::init_failed(
                    PluginKind::Processor,
                    &processors[index].0,
                    err,
                );
                for (name, plugin, _) in processors[..index].iter_mut().rev() {
                    close_quietly(name, plugin.as_mut()).await;
                }
                close_quietly(&recipe.source.name, extractor.as_mut()).await;
                return (0, Some(failed));
            }
        }

        for index in 0..sinks.len() {
            let config = sinks[index].2.clone();
            if let Err(err) = sinks[index].1.init(&ctx, config).await {
                let failed = PluginError::init_failed(PluginKind::Sink, &sinks[index].0, err);
                for (name, plugin, _) in sinks[..index].iter_mut().rev() {
                    close_quietly(name, plugin.as_mut()).await;
                }
                for (name, plugin, _) in processors.iter_mut().rev() {
                    close_quietly(name, plugin.as_mut()).await;
                }
                close_quietly(&recipe.source.name, extractor.as_mut()).await;
                return (0, Some(failed));
            }
        }

        // Cancellation before extraction begins: close everything in
        // reverse init order, emit nothing, touch no sink.
        if token.is_cancelled() {
            for (name, plugin, _) in sinks.iter_mut().rev() {
                close_quietly(name, plugin.as_mut()).await;
            }
            for (name, plugin, _) in processors.iter_mut().rev() {
                close_quietly(name, plugin.as_mut()).await;
            }
            close_quietly(&recipe.source.name, extractor.as_mut()).await;
            return (0, Some(PluginError::Cancelled));
        }

        self.run_pipeline(token, &ctx, recipe, extractor, processors, sinks)
            .await
    }

    #[allow(clippy::type_complexity)]
    async fn run_pipeline(
        &self,
        token: &CancellationToken,
        ctx: &PluginContext,
        recipe: &Recipe,
        extractor: Box<dyn Extractor>,
        processors: Vec<(String, Box<dyn Processor>, Config)>,
        sinks: Vec<(String, Box<dyn Sink>, Config)>,
    ) -> (usize, Option<PluginError>) {
        let capacity = self.channel_capacity;
        let (source_tx, source_rx) = mpsc::channel::<Record>(capacity);
        let (fanout_tx, fanout_rx) = mpsc::channel::<Record>(capacity);

        let mut sink_txs = Vec::with_capacity(sinks.len());
        let mut sink_tasks: Vec<(String, JoinHandle<Result<(), PluginError>>)> =
            Vec::with_capacity(sinks.len());
        for (name, sink, _) in sinks {
            let (tx, rx) = mpsc::channel::<Record>(capacity);
            sink_txs.push(tx);
            sink_tasks.push((
                name.clone(),
                self.spawn_sink_task(name, sink, rx, ctx.clone(), token.clone()),
            ));
        }

        let source_task = spawn_source_task(
            recipe.source.name.clone(),
            extractor,
            source_tx,
            ctx.clone(),
            token.clone(),
        );
        let processor_task = spawn_processor_task(
            processors,
            source_rx,
            fanout_tx,
            ctx.clone(),
            token.clone(),
        );
        let fanout_task = spawn_fanout_task(fanout_rx, sink_txs, token.clone());

        // Collect stage results in pipeline order; the first fatal error
        // (anything but Cancelled) becomes the run error.
        let (record_count, source_result) = match source_task.await {
            Ok(outcome) => outcome,
            Err(join_err) => (
                0,
                Err(PluginError::extract_failed(format!(
                    "source task panicked: {join_err}"
                ))),
            ),
        };

        let processor_result = match processor_task.await {
            Ok(result) => result,
            Err(join_err) => Err(PluginError::process_failed(
                "pipeline",
                format!("processor task panicked: {join_err}"),
            )),
        };

        let _ = fanout_task.await;

        let mut stage_errors = Vec::new();
        if let Err(err) = source_result {
            stage_errors.push(err);
        }
        if let Err(err) = processor_result {
            stage_errors.push(err);
        }
        for (name, task) in sink_tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => stage_errors.push(err),
                Err(join_err) => stage_errors.push(PluginError::sink_failed(
                    name,
                    format!("sink task panicked: {join_err}"),
                )),
            }
        }

        let error = stage_errors
            .iter()
            .find(|err| !matches!(err, PluginError::Cancelled))
            .cloned()
            .or_else(|| {
                if token.is_cancelled() || !stage_errors.is_empty() {
                    Some(PluginError::Cancelled)
                } else {
                    None
                }
            });

        (record_count, error)
    }

    fn spawn_sink_task(
        &self,
        name: String,
        mut sink: Box<dyn Sink>,
        mut rx: mpsc::Receiver<Record>,
        ctx: PluginContext,
        token: CancellationToken,
    ) -> JoinHandle<Result<(), PluginError>> {
        let retry = self.retry.clone();
        let batch_size = self.sink_batch_size;

        tokio::spawn(async move {
            let mut result: Result<(), PluginError> = Ok(());
            let mut batch: Vec<Record> = Vec::with_capacity(batch_size);

            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(record) => {
                            batch.push(record);
                            if batch.len() >= batch_size {
                                if let Err(err) =
                                    deliver(&name, sink.as_mut(), &ctx, &batch, &retry, &token).await
                                {
                                    result = Err(err);
                                    token.cancel();
                                    break;
                                }
                                batch.clear();
                            }
                        }
                        None => {
                            // Source completed: flush the partial batch,
                            // unless the run is already failing.
                            if !batch.is_empty() && !token.is_cancelled() {
                                if let Err(err) =
                                    deliver(&name, sink.as_mut(), &ctx, &batch, &retry, &token).await
                                {
                                    result = Err(err);
                                    token.cancel();
                                }
                            }
                            break;
                        }
                    },
                    _ = token.cancelled() => break,
                }
            }

            if let Err(close_err) = sink.close().await {
                warn!(sink = %name, error = %close_err, "sink close failed");
                if result.is_ok() {
                    result = Err(PluginError::sink_failed(&name, close_err));
                }
            }
            result
        })
    }
}

// =============================================================================
// Stage tasks
// =============================================================================

fn spawn_source_task(
    name: String,
    mut extractor: Box<dyn Extractor>,
    tx: mpsc::Sender<Record>,
    ctx: PluginContext,
    token: CancellationToken,
) -> JoinHandle<(usize, Result<(), PluginError>)> {
    tokio::spawn(async move {
        let emitter = Emitter::new(tx, token.clone());
        let mut result = match extractor.extract(&ctx, &emitter).await {
            Ok(()) => Ok(()),
            Err(PluginError::Cancelled) => Err(PluginError::Cancelled),
            Err(err @ PluginError::ExtractFailed { .. }) => Err(err),
            Err(err) => Err(PluginError::extract_failed(err)),
        };
        let emitted = emitter.emitted();
        // Closing the channel lets the processor chain drain and finish.
        drop(emitter);

        if result.is_err() {
            token.cancel();
        }

        if let Err(close_err) = extractor.close().await {
            warn!(extractor = %name, error = %close_err, "extractor close failed");
            if result.is_ok() {
                result = Err(PluginError::extract_failed(close_err));
            }
        }

        debug!(extractor = %name, records = emitted, "source finished");
        (emitted, result)
    })
}

fn spawn_processor_task(
    mut processors: Vec<(String, Box<dyn Processor>, Config)>,
    mut rx: mpsc::Receiver<Record>,
    tx: mpsc::Sender<Record>,
    ctx: PluginContext,
    token: CancellationToken,
) -> JoinHandle<Result<(), PluginError>> {
    tokio::spawn(async move {
        let mut result: Result<(), PluginError> = Ok(());

        'drain: loop {
            let record = tokio::select! {
                received = rx.recv() => match received {
                    Some(record) => record,
                    None => break 'drain,
                },
                _ = token.cancelled() => break 'drain,
            };

            let mut record = record;
            for (name, processor, _) in processors.iter_mut() {
                match processor.process(&ctx, record).await {
                    Ok(next) => record = next,
                    Err(PluginError::Cancelled) => {
                        result = Err(PluginError::Cancelled);
                        break 'drain;
                    }
                    Err(err) => {
                        result = Err(PluginError::process_failed(name.clone(), err));
                        token.cancel();
                        break 'drain;
                    }
                }
            }

            if tx.send(record).await.is_err() {
                // Fanout is gone; the failing stage has cancelled the run.
                break 'drain;
            }
        }
        drop(tx);

        for (name, processor, _) in processors.iter_mut() {
            if let Err(close_err) = processor.close().await {
                warn!(processor = %name, error = %close_err, "processor close failed");
                if result.is_ok() {
                    result = Err(PluginError::process_failed(name.clone(), close_err));
                }
            }
        }
        result
    })
}

fn spawn_fanout_task(
    mut rx: mpsc::Receiver<Record>,
    sink_txs: Vec<mpsc::Sender<Record>>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let record = tokio::select! {
                received = rx.recv() => match received {
                    Some(record) => record,
                    None => break,
                },
                _ = token.cancelled() => break,
            };

            for tx in &sink_txs {
                // A closed sink channel means that sink failed and
                // cancelled the run; keep feeding the others until the
                // cancellation is observed.
                let _ = tx.send(record.clone()).await;
            }
        }
    })
}

/// Delivers one batch, retrying retryable failures with backoff. The batch
/// is re-sent unchanged; non-retryable errors and exhausted retries map to
/// `SinkFailed`.
async fn deliver(
    name: &str,
    sink: &mut dyn Sink,
    ctx: &PluginContext,
    batch: &[Record],
    retry: &RetryPolicy,
    token: &CancellationToken,
) -> Result<(), PluginError> {
    let mut attempt: u32 = 1;
    loop {
        match sink.sink(ctx, batch).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_retryable() && retry.allows_retry(attempt) => {
                let delay = retry.backoff(attempt);
                warn!(
                    sink = %name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying sink delivery"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = token.cancelled() => return Err(PluginError::Cancelled),
                }
                attempt += 1;
            }
            Err(PluginError::Cancelled) => return Err(PluginError::Cancelled),
            Err(err) => return Err(PluginError::sink_failed(name, err.into_inner())),
        }
    }
}

/// Normalizes a `validate` rejection into `InvalidConfig` with the recipe
/// position attached; rejections that already are `InvalidConfig` keep
/// their own cause.
fn config_error(
    kind: PluginKind,
    name: &str,
    err: PluginError,
    position: Option<meteor_core::Position>,
) -> PluginError {
    match err {
        already @ PluginError::InvalidConfig { .. } => already.at(position),
        other => PluginError::invalid_config(kind, name, other).at(position),
    }
}

async fn close_quietly<P: meteor_core::Plugin + ?Sized>(name: &str, plugin: &mut P) {
    if let Err(err) = plugin.close().await {
        warn!(plugin = %name, error = %err, "plugin close failed");
    }
}
