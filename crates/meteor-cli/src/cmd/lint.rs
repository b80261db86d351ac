//! `meteor lint` - validate recipes without executing them.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use meteor_runtime::{Agent, RecipeReader};

pub fn lint(path: &Path) -> ExitCode {
    let registry = match super::build_registry() {
        Ok(registry) => registry,
        Err(err) => {
            eprintln!("failed to register plugins: {err}");
            return ExitCode::FAILURE;
        }
    };
    let agent = Agent::new(Arc::new(registry));

    let recipes = match RecipeReader::new().read(path) {
        Ok(recipes) => recipes,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    if recipes.is_empty() {
        println!("No recipe found in {}", path.display());
        return ExitCode::SUCCESS;
    }

    let mut failures = 0;
    for recipe in &recipes {
        let errors = agent.validate(recipe);
        if errors.is_empty() {
            println!("OK    {}", recipe.name);
            continue;
        }

        failures += 1;
        println!("FAIL  {}", recipe.name);
        for error in errors {
            match error.position() {
                Some(position) => println!("      [{position}] {error}"),
                None => println!("      {error}"),
            }
        }
    }

    println!();
    println!("{} recipe(s) checked, {} with issues", recipes.len(), failures);

    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
