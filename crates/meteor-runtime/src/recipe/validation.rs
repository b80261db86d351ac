//! Structural recipe validation.
//!
//! Only shape is checked here: the recipe has a name, exactly one source,
//! at least one sink, and every plugin reference carries a name. Whether
//! the referenced plugins exist and accept their configuration is the
//! agent's job (`Agent::validate`).

use std::path::Path;

use super::error::RecipeError;
use super::schema::Recipe;

pub fn validate_recipe(recipe: &Recipe, path: &Path) -> Result<(), RecipeError> {
    let invalid = |reason: String| RecipeError::Invalid {
        path: path.to_path_buf(),
        reason,
    };

    if recipe.name.is_empty() {
        return Err(invalid("recipe name is required".into()));
    }

    if recipe.source.name.is_empty() {
        return Err(invalid("a source with a name is required".into()));
    }

    if recipe.sinks.is_empty() {
        return Err(invalid("at least one sink is required".into()));
    }

    for (index, processor) in recipe.processors.iter().enumerate() {
        if processor.name.is_empty() {
            return Err(invalid(format!("processor #{} has no name", index + 1)));
        }
    }

    for (index, sink) in recipe.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(invalid(format!("sink #{} has no name", index + 1)));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::schema::PluginRef;
    use super::*;

    fn minimal() -> Recipe {
        Recipe {
            name: "sample".into(),
            source: PluginRef::new("csv"),
            processors: vec![],
            sinks: vec![PluginRef::new("console")],
        }
    }

    #[test]
    fn minimal_recipe_passes() {
        validate_recipe(&minimal(), Path::new("sample.yaml")).unwrap();
    }

    #[test]
    fn missing_name_is_rejected() {
        let mut recipe = minimal();
        recipe.name.clear();
        let err = validate_recipe(&recipe, Path::new("sample.yaml")).unwrap_err();
        assert!(err.to_string().contains("name is required"));
    }

    #[test]
    fn missing_source_is_rejected() {
        let mut recipe = minimal();
        recipe.source = PluginRef::default();
        let err = validate_recipe(&recipe, Path::new("sample.yaml")).unwrap_err();
        assert!(err.to_string().contains("source"));
    }

    #[test]
    fn empty_sinks_are_rejected() {
        let mut recipe = minimal();
        recipe.sinks.clear();
        let err = validate_recipe(&recipe, Path::new("sample.yaml")).unwrap_err();
        assert!(err.to_string().contains("at least one sink"));
    }

    #[test]
    fn unnamed_plugin_reference_is_rejected() {
        let mut recipe = minimal();
        recipe.processors.push(PluginRef::default());
        let err = validate_recipe(&recipe, Path::new("sample.yaml")).unwrap_err();
        assert!(err.to_string().contains("processor #1"));
    }
}
