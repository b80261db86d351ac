//! Recipe file loader.
//!
//! Reads one file or a directory of files (non-recursive, `.yaml`/`.yml`),
//! expands `${VAR}` references from the environment, and parses each
//! document twice: once with `serde_yaml` for the typed recipe and once
//! with `marked-yaml` to recover the line and column of every plugin
//! reference.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use marked_yaml::types::{MarkedMappingNode, Node};
use regex_lite::Regex;
use tracing::{debug, warn};

use meteor_core::Position;

use super::error::RecipeError;
use super::schema::Recipe;
use super::validation::validate_recipe;

const RECIPE_KEYS: &[&str] = &["name", "source", "processors", "sinks"];
const PLUGIN_KEYS: &[&str] = &["name", "config"];

/// Loads recipes from disk.
pub struct RecipeReader {
    /// Overrides the process environment for variable lookups.
    vars: Option<BTreeMap<String, String>>,
}

impl RecipeReader {
    pub fn new() -> Self {
        Self { vars: None }
    }

    /// Uses `vars` instead of the process environment. Intended for tests
    /// and embedding.
    pub fn with_vars(mut self, vars: BTreeMap<String, String>) -> Self {
        self.vars = Some(vars);
        self
    }

    /// Reads a recipe file, or every recipe in a directory (sorted by file
    /// name, non-recursive).
    pub fn read(&self, path: impl AsRef<Path>) -> Result<Vec<Recipe>, RecipeError> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path).map_err(|source| RecipeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if meta.is_dir() {
            self.read_dir(path)
        } else {
            self.read_file(path).map(|recipe| vec![recipe])
        }
    }

    /// Reads every `.yaml`/`.yml` file directly inside `path`.
    pub fn read_dir(&self, path: &Path) -> Result<Vec<Recipe>, RecipeError> {
        let entries = std::fs::read_dir(path).map_err(|source| RecipeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| RecipeError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let file = entry.path();
            if file.is_file() && is_recipe_file(&file) {
                files.push(file);
            }
        }
        files.sort();

        debug!(path = %path.display(), count = files.len(), "reading recipe directory");

        files
            .into_iter()
            .map(|file| self.read_file(&file))
            .collect()
    }

    /// Reads a single recipe document.
    pub fn read_file(&self, path: &Path) -> Result<Recipe, RecipeError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RecipeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let expanded = self.expand_vars(&raw, path)?;

        let mut recipe: Recipe =
            serde_yaml::from_str(&expanded).map_err(|err| RecipeError::Parse {
                path: path.to_path_buf(),
                cause: err.to_string(),
            })?;

        // Best-effort second parse for positions and unknown-key warnings;
        // the typed parse above already established the document is valid.
        if let Ok(doc) = marked_yaml::parse_yaml(0, &expanded) {
            annotate_positions(&mut recipe, &doc);
            warn_unknown_keys(&doc, path);
        }

        validate_recipe(&recipe, path)?;
        Ok(recipe)
    }

    /// Expands `${VAR}` and `${VAR:-default}`; `$$` yields a literal `$`.
    /// A reference to an unset variable without a default fails the read.
    fn expand_vars(&self, content: &str, path: &Path) -> Result<String, RecipeError> {
        let re = Regex::new(r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}")
            .expect("variable pattern is valid");

        let mut out = String::with_capacity(content.len());
        let mut last = 0;
        for caps in re.captures_iter(content) {
            let matched = caps.get(0).expect("capture 0 always present");
            out.push_str(&content[last..matched.start()]);
            last = matched.end();

            if matched.as_str() == "$$" {
                out.push('$');
                continue;
            }

            let name = caps.get(1).expect("variable name group").as_str();
            let value = match self.lookup(name) {
                Some(value) => value,
                None => match caps.get(3) {
                    Some(default_value) => default_value.as_str().to_string(),
                    None => {
                        return Err(RecipeError::UnsetVariable {
                            name: name.to_string(),
                            path: path.to_path_buf(),
                        });
                    }
                },
            };
            out.push_str(&value);
        }
        out.push_str(&content[last..]);
        Ok(out)
    }

    fn lookup(&self, name: &str) -> Option<String> {
        match &self.vars {
            Some(vars) => vars.get(name).cloned(),
            None => std::env::var(name).ok(),
        }
    }
}

impl Default for RecipeReader {
    fn default() -> Self {
        Self::new()
    }
}

fn is_recipe_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}

// =============================================================================
// Position annotation
// =============================================================================

fn annotate_positions(recipe: &mut Recipe, doc: &Node) {
    let Some(root) = doc.as_mapping() else {
        return;
    };

    if let Some(source) = get(root, "source") {
        recipe.source.position = plugin_position(source);
    }

    if let Some(processors) = get(root, "processors").and_then(Node::as_sequence) {
        for (reference, node) in recipe.processors.iter_mut().zip(processors.iter()) {
            reference.position = plugin_position(node);
        }
    }

    if let Some(sinks) = get(root, "sinks").and_then(Node::as_sequence) {
        for (reference, node) in recipe.sinks.iter_mut().zip(sinks.iter()) {
            reference.position = plugin_position(node);
        }
    }
}

/// The position of a plugin reference is the position of its `name` value.
fn plugin_position(node: &Node) -> Option<Position> {
    let name = get(node.as_mapping()?, "name")?.as_scalar()?;
    let marker = name.span().start()?;
    Some(Position {
        line: marker.line() as u32,
        column: marker.column() as u32,
    })
}

fn get<'a>(map: &'a MarkedMappingNode, key: &str) -> Option<&'a Node> {
    map.iter()
        .find(|(candidate, _)| candidate.as_str() == key)
        .map(|(_, value)| value)
}

// =============================================================================
// Unknown-key warnings
// =============================================================================

fn warn_unknown_keys(doc: &Node, path: &Path) {
    let Some(root) = doc.as_mapping() else {
        return;
    };

    warn_keys_outside(root, RECIPE_KEYS, path);

    if let Some(source) = get(root, "source").and_then(Node::as_mapping) {
        warn_keys_outside(source, PLUGIN_KEYS, path);
    }
    for section in ["processors", "sinks"] {
        if let Some(items) = get(root, section).and_then(Node::as_sequence) {
            for item in items.iter() {
                if let Some(map) = item.as_mapping() {
                    warn_keys_outside(map, PLUGIN_KEYS, path);
                }
            }
        }
    }
}

fn warn_keys_outside(map: &MarkedMappingNode, known: &[&str], path: &Path) {
    for (key, _) in map.iter() {
        if !known.contains(&key.as_str()) {
            warn!(
                path = %path.display(),
                key = key.as_str(),
                "ignoring unknown recipe key"
            );
        }
    }
}
