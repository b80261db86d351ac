//! `meteor new recipe` - scaffold a recipe on standard output.
//!
//! Sample configurations come from the plugins' own `info()`, so the
//! scaffold stays in sync with what the plugins document.

use std::process::ExitCode;

use meteor_core::PluginKind;
use meteor_runtime::Registry;

const DEFAULT_EXTRACTOR: &str = "csv";
const DEFAULT_SINK: &str = "console";

pub fn new_recipe(
    name: &str,
    extractor: Option<String>,
    sinks: Option<String>,
    processors: Option<String>,
) -> ExitCode {
    let registry = match super::build_registry() {
        Ok(registry) => registry,
        Err(err) => {
            eprintln!("failed to register plugins: {err}");
            return ExitCode::FAILURE;
        }
    };

    let extractor = extractor.unwrap_or_else(|| DEFAULT_EXTRACTOR.into());
    let sinks = split_list(sinks.as_deref()).unwrap_or_else(|| vec![DEFAULT_SINK.into()]);
    let processors = split_list(processors.as_deref()).unwrap_or_default();

    print!(
        "{}",
        scaffold(&registry, name, &extractor, &processors, &sinks)
    );
    ExitCode::SUCCESS
}

fn split_list(value: Option<&str>) -> Option<Vec<String>> {
    let value = value?;
    if value.is_empty() {
        return None;
    }
    Some(
        value
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
    )
}

fn scaffold(
    registry: &Registry,
    name: &str,
    extractor: &str,
    processors: &[String],
    sinks: &[String],
) -> String {
    let mut out = String::new();
    out.push_str(&format!("name: {name}\n"));

    out.push_str("source:\n");
    out.push_str(&format!("  name: {extractor}\n"));
    push_config(
        &mut out,
        sample_config(registry, PluginKind::Extractor, extractor),
        2,
    );

    if !processors.is_empty() {
        out.push_str("processors:\n");
        for processor in processors {
            out.push_str(&format!("  - name: {processor}\n"));
            push_config(
                &mut out,
                sample_config(registry, PluginKind::Processor, processor),
                4,
            );
        }
    }

    out.push_str("sinks:\n");
    for sink in sinks {
        out.push_str(&format!("  - name: {sink}\n"));
        push_config(&mut out, sample_config(registry, PluginKind::Sink, sink), 4);
    }

    out
}

/// The plugin's documented sample config, if the plugin exists and
/// documents one.
fn sample_config(registry: &Registry, kind: PluginKind, name: &str) -> Option<String> {
    let sample = match kind {
        PluginKind::Extractor => registry.extractor(name).ok()?.info().sample_config,
        PluginKind::Processor => registry.processor(name).ok()?.info().sample_config,
        PluginKind::Sink => registry.sink(name).ok()?.info().sample_config,
    };
    (!sample.is_empty()).then_some(sample)
}

fn push_config(out: &mut String, sample: Option<String>, indent: usize) {
    let Some(sample) = sample else {
        return;
    };
    let pad = " ".repeat(indent);
    out.push_str(&format!("{pad}config:\n"));
    for line in sample.lines() {
        out.push_str(&format!("{pad}  {line}\n"));
    }
}

#[cfg(test)]
mod tests {
    use meteor_runtime::Recipe;

    use super::*;

    #[test]
    fn scaffold_is_a_valid_recipe() {
        let registry = super::super::build_registry().unwrap();
        let text = scaffold(
            &registry,
            "sample",
            "csv",
            &["enrich".into()],
            &["console".into(), "file".into()],
        );

        let recipe: Recipe = serde_yaml::from_str(&text).unwrap();
        assert_eq!(recipe.name, "sample");
        assert_eq!(recipe.source.name, "csv");
        // The csv sample config carries its documented path.
        assert!(recipe.source.config.get("path").is_some());
        assert_eq!(recipe.processors.len(), 1);
        assert_eq!(recipe.sinks.len(), 2);
    }

    #[test]
    fn unknown_plugins_scaffold_without_config() {
        let registry = super::super::build_registry().unwrap();
        let text = scaffold(&registry, "sample", "bigquery", &[], &["console".into()]);

        let recipe: Recipe = serde_yaml::from_str(&text).unwrap();
        assert_eq!(recipe.source.name, "bigquery");
        assert!(recipe.source.config.is_empty());
    }

    #[test]
    fn comma_separated_lists_are_split_and_trimmed() {
        assert_eq!(
            split_list(Some("console, file ,http")),
            Some(vec![
                "console".to_string(),
                "file".to_string(),
                "http".to_string()
            ])
        );
        assert_eq!(split_list(Some("")), None);
        assert_eq!(split_list(None), None);
    }
}
