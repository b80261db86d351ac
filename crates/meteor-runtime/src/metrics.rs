//! Run metrics observer.
//!
//! One optional collaborator per agent receives every finished [`Run`].
//! The statsd implementation tags metric names with comma-separated
//! `k=v` suffixes; the suffix form is the external contract:
//!
//! ```text
//! <prefix>.runDuration,name=<recipe>,success=<bool>,records=<n>  (timing, ms)
//! <prefix>.run,name=<recipe>,success=<bool>,records=<n>          (+1)
//! <prefix>.runRecordCount,name=<recipe>,success=<bool>,records=<n> (+records)
//! ```

use std::net::UdpSocket;

use cadence::prelude::*;
use cadence::{StatsdClient, UdpMetricSink};
use thiserror::Error;
use tracing::warn;

use crate::agent::Run;

/// Observes finished runs. Shared across recipes; implementations must be
/// safe for concurrent calls.
pub trait Monitor: Send + Sync {
    fn record_run(&self, run: &Run);
}

/// Errors building the statsd client.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Statsd(#[from] cadence::MetricError),
}

/// Reports run metrics to a statsd daemon over UDP.
pub struct StatsdMonitor {
    client: StatsdClient,
}

impl StatsdMonitor {
    pub fn new(client: StatsdClient) -> Self {
        Self { client }
    }

    /// Connects to `host` (e.g. `localhost:8125`); `prefix` is prepended
    /// to every metric name.
    pub fn try_new(host: &str, prefix: &str) -> Result<Self, MonitorError> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;
        let sink = UdpMetricSink::from(host, socket)?;
        Ok(Self::new(StatsdClient::from_sink(prefix, sink)))
    }
}

impl Monitor for StatsdMonitor {
    fn record_run(&self, run: &Run) {
        let labels = format!(
            "name={},success={},records={}",
            run.recipe, run.success, run.record_count
        );

        if let Err(err) = self
            .client
            .time(&format!("runDuration,{labels}"), run.duration.as_millis() as u64)
        {
            warn!(recipe = %run.recipe, error = %err, "failed to report run duration");
        }
        if let Err(err) = self.client.incr(&format!("run,{labels}")) {
            warn!(recipe = %run.recipe, error = %err, "failed to report run counter");
        }
        if let Err(err) = self.client.count(
            &format!("runRecordCount,{labels}"),
            run.record_count as i64,
        ) {
            warn!(recipe = %run.recipe, error = %err, "failed to report run record count");
        }
    }
}
