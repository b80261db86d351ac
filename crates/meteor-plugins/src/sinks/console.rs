//! Console sink: one JSON line per record on stdout.

use std::io::Write;

use async_trait::async_trait;

use meteor_core::{Config, Plugin, PluginContext, PluginError, PluginInfo, Record, Sink};

/// Prints every record as a JSON line. Useful for recipe development and
/// piping into other tools.
#[derive(Debug, Default)]
pub struct ConsoleSink;

#[async_trait]
impl Plugin for ConsoleSink {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            description: "Print records to standard output as JSON lines".into(),
            sample_config: String::new(),
            summary: "No configuration; intended for development and debugging.".into(),
            tags: vec!["console".into(), "sink".into()],
        }
    }

    fn validate(&self, _config: &Config) -> Result<(), PluginError> {
        Ok(())
    }

    async fn init(&mut self, _ctx: &PluginContext, _config: Config) -> Result<(), PluginError> {
        Ok(())
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    async fn sink(&mut self, _ctx: &PluginContext, batch: &[Record]) -> Result<(), PluginError> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for record in batch {
            let line = serde_json::to_string(record)
                .map_err(|err| PluginError::sink_failed("console", err))?;
            writeln!(out, "{line}").map_err(|err| PluginError::sink_failed("console", err))?;
        }
        Ok(())
    }
}
