//! CLI subcommands.

pub mod lint;
pub mod new;
pub mod run;

use meteor_runtime::Registry;

/// The process-wide registry, populated with the reference plugins.
pub(crate) fn build_registry() -> Result<Registry, meteor_runtime::RegistryError> {
    let mut registry = Registry::new();
    meteor_plugins::register_all(&mut registry)?;
    Ok(registry)
}
