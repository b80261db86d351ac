//! `meteor run` - execute recipes.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use meteor_runtime::{Agent, AgentEnv, Monitor, RecipeReader, StatsdMonitor};

pub async fn run(path: &Path, env: &AgentEnv) -> ExitCode {
    let registry = match super::build_registry() {
        Ok(registry) => registry,
        Err(err) => {
            eprintln!("failed to register plugins: {err}");
            return ExitCode::FAILURE;
        }
    };

    let monitor: Option<Arc<dyn Monitor>> = if env.statsd_enabled {
        match StatsdMonitor::try_new(&env.statsd_host, &env.statsd_prefix) {
            Ok(monitor) => Some(Arc::new(monitor)),
            Err(err) => {
                eprintln!("failed to set up statsd at {}: {err}", env.statsd_host);
                return ExitCode::FAILURE;
            }
        }
    } else {
        None
    };

    let recipes = match RecipeReader::new().read(path) {
        Ok(recipes) => recipes,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    if recipes.is_empty() {
        println!("No recipe found in {}", path.display());
        println!();
        println!("Use 'meteor new recipe' to generate a new recipe.");
        return ExitCode::SUCCESS;
    }

    let mut builder = Agent::builder(Arc::new(registry));
    if let Some(monitor) = monitor {
        builder = builder.monitor(monitor);
    }
    let agent = builder.build();

    // Ctrl-C cancels the current and all remaining runs; plugins still
    // get closed before the process exits.
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("interrupt received, cancelling runs");
                signal_token.cancel();
            }
            Err(err) => warn!(error = %err, "failed to listen for interrupts"),
        }
    });

    match agent.run_multiple(&token, &recipes).await {
        Ok(failed) if failed.is_empty() => {
            println!("Done! {} recipe(s) succeeded", recipes.len());
            ExitCode::SUCCESS
        }
        Ok(failed) => {
            println!(
                "Done! {} recipe(s) succeeded, {} failed: {}",
                recipes.len() - failed.len(),
                failed.len(),
                failed.join(", ")
            );
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
