//! Plugin factory registry.
//!
//! The registry maps plugin names to zero-arg constructors, one map per
//! capability. It is populated by explicit registration calls during
//! startup and shared read-only afterwards (`Arc<Registry>`): factories
//! are invoked once per recipe execution, so every run gets fresh plugin
//! instances and plugins may hold per-run state.

use std::collections::HashMap;

use thiserror::Error;

use meteor_core::{Extractor, PluginError, PluginKind, Processor, Sink};

type ExtractorFactory = Box<dyn Fn() -> Box<dyn Extractor> + Send + Sync>;
type ProcessorFactory = Box<dyn Fn() -> Box<dyn Processor> + Send + Sync>;
type SinkFactory = Box<dyn Fn() -> Box<dyn Sink> + Send + Sync>;

/// Errors raised while populating the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The name is already taken within the capability.
    #[error("{kind} \"{name}\" is already registered")]
    Duplicate { kind: PluginKind, name: String },
}

/// Process-scoped mapping of plugin names to constructors.
#[derive(Default)]
pub struct Registry {
    extractors: HashMap<String, ExtractorFactory>,
    processors: HashMap<String, ProcessorFactory>,
    sinks: HashMap<String, SinkFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_extractor<F>(
        &mut self,
        name: impl Into<String>,
        factory: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn() -> Box<dyn Extractor> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.extractors.contains_key(&name) {
            return Err(RegistryError::Duplicate {
                kind: PluginKind::Extractor,
                name,
            });
        }
        self.extractors.insert(name, Box::new(factory));
        Ok(())
    }

    pub fn register_processor<F>(
        &mut self,
        name: impl Into<String>,
        factory: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn() -> Box<dyn Processor> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.processors.contains_key(&name) {
            return Err(RegistryError::Duplicate {
                kind: PluginKind::Processor,
                name,
            });
        }
        self.processors.insert(name, Box::new(factory));
        Ok(())
    }

    pub fn register_sink<F>(
        &mut self,
        name: impl Into<String>,
        factory: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn() -> Box<dyn Sink> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.sinks.contains_key(&name) {
            return Err(RegistryError::Duplicate {
                kind: PluginKind::Sink,
                name,
            });
        }
        self.sinks.insert(name, Box::new(factory));
        Ok(())
    }

    /// Constructs a fresh extractor instance.
    pub fn extractor(&self, name: &str) -> Result<Box<dyn Extractor>, PluginError> {
        self.extractors
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| PluginError::not_found(PluginKind::Extractor, name))
    }

    /// Constructs a fresh processor instance.
    pub fn processor(&self, name: &str) -> Result<Box<dyn Processor>, PluginError> {
        self.processors
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| PluginError::not_found(PluginKind::Processor, name))
    }

    /// Constructs a fresh sink instance.
    pub fn sink(&self, name: &str) -> Result<Box<dyn Sink>, PluginError> {
        self.sinks
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| PluginError::not_found(PluginKind::Sink, name))
    }

    /// Registered names for one capability, sorted for stable output.
    pub fn names(&self, kind: PluginKind) -> Vec<String> {
        let mut names: Vec<String> = match kind {
            PluginKind::Extractor => self.extractors.keys().cloned().collect(),
            PluginKind::Processor => self.processors.keys().cloned().collect(),
            PluginKind::Sink => self.sinks.keys().cloned().collect(),
        };
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::testing::{FakeExtractor, MemSink};

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = Registry::new();
        registry
            .register_sink("mem", || Box::new(MemSink::default()))
            .unwrap();

        let err = registry
            .register_sink("mem", || Box::new(MemSink::default()))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::Duplicate {
                kind: PluginKind::Sink,
                name: "mem".into()
            }
        );
    }

    #[test]
    fn unknown_name_yields_not_found_with_kind() {
        let registry = Registry::new();
        let err = registry.sink("noSuchSink").unwrap_err();
        assert!(matches!(
            err,
            PluginError::NotFound {
                kind: PluginKind::Sink,
                ..
            }
        ));
        assert_eq!(err.to_string(), "could not find sink \"noSuchSink\"");
    }

    #[test]
    fn factories_produce_a_fresh_instance_per_call() {
        let constructed = Arc::new(AtomicUsize::new(0));
        let counter = constructed.clone();

        let mut registry = Registry::new();
        registry
            .register_extractor("fake", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::new(FakeExtractor::default())
            })
            .unwrap();

        registry.extractor("fake").unwrap();
        registry.extractor("fake").unwrap();
        assert_eq!(constructed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn names_are_sorted_per_capability() {
        let mut registry = Registry::new();
        registry
            .register_sink("mem", || Box::new(MemSink::default()))
            .unwrap();
        registry
            .register_sink("console", || Box::new(MemSink::default()))
            .unwrap();

        assert_eq!(registry.names(PluginKind::Sink), vec!["console", "mem"]);
        assert!(registry.names(PluginKind::Processor).is_empty());
    }
}
