//! # Meteor Plugins
//!
//! Reference plugin adapters for the Meteor collection agent:
//!
//! - **extractors**: [`extractors::csv::CsvExtractor`],
//!   [`extractors::github::GithubExtractor`],
//!   [`extractors::grafana::GrafanaExtractor`]
//! - **processors**: [`processors::enrich::EnrichProcessor`]
//! - **sinks**: [`sinks::console::ConsoleSink`], [`sinks::file::FileSink`],
//!   [`sinks::http::HttpSink`]
//!
//! Plugins are registered explicitly at startup; there is no discovery:
//!
//! ```rust,ignore
//! let mut registry = Registry::new();
//! meteor_plugins::register_all(&mut registry)?;
//! let agent = Agent::new(Arc::new(registry));
//! ```

pub mod extractors;
pub mod processors;
pub mod sinks;

use meteor_runtime::registry::{Registry, RegistryError};

/// Registers every plugin in this crate under its canonical name.
pub fn register_all(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register_extractor("csv", || Box::new(extractors::csv::CsvExtractor::default()))?;
    registry.register_extractor("github", || {
        Box::new(extractors::github::GithubExtractor::default())
    })?;
    registry.register_extractor("grafana", || {
        Box::new(extractors::grafana::GrafanaExtractor::default())
    })?;

    registry.register_processor("enrich", || {
        Box::new(processors::enrich::EnrichProcessor::default())
    })?;

    registry.register_sink("console", || Box::new(sinks::console::ConsoleSink::default()))?;
    registry.register_sink("file", || Box::new(sinks::file::FileSink::default()))?;
    registry.register_sink("http", || Box::new(sinks::http::HttpSink::default()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meteor_core::PluginKind;

    #[test]
    fn registers_the_reference_plugins() {
        let mut registry = Registry::new();
        register_all(&mut registry).unwrap();

        assert_eq!(
            registry.names(PluginKind::Extractor),
            vec!["csv", "github", "grafana"]
        );
        assert_eq!(registry.names(PluginKind::Processor), vec!["enrich"]);
        assert_eq!(
            registry.names(PluginKind::Sink),
            vec!["console", "file", "http"]
        );
    }

    #[test]
    fn registering_twice_reports_the_duplicate() {
        let mut registry = Registry::new();
        register_all(&mut registry).unwrap();
        assert!(register_all(&mut registry).is_err());
    }
}
