//! meteor - metadata collection agent CLI
//!
//! Usage:
//!   meteor run <path>           Execute recipes at path (file or directory)
//!   meteor lint <path>          Check recipes for issues without executing
//!   meteor new recipe <name>    Generate a recipe on standard output
//!
//! Exit codes: 0 when everything succeeded, 1 when any recipe failed,
//! 2 on usage errors (clap's default).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use meteor_runtime::{AgentEnv, LoggingBuilder};

mod cmd;

#[derive(Parser)]
#[command(
    name = "meteor",
    version,
    about = "Meteor is a plugin-driven metadata collection agent"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute recipes at a path (file or directory)
    Run {
        /// Recipe file or directory of recipes
        path: PathBuf,
    },
    /// Check recipes for issues without executing them
    Lint {
        /// Recipe file or directory of recipes
        path: PathBuf,
    },
    /// Bootstrap new recipes
    #[command(subcommand)]
    New(NewTarget),
}

#[derive(Subcommand)]
enum NewTarget {
    /// Generate a recipe on standard output
    Recipe {
        /// Recipe name, without extension
        name: String,
        /// Type of extractor
        #[arg(short = 'e', long)]
        extractor: Option<String>,
        /// Comma-separated list of sink types
        #[arg(short = 's', long)]
        sinks: Option<String>,
        /// Comma-separated list of processor types
        #[arg(short = 'p', long)]
        processors: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let env = match AgentEnv::load() {
        Ok(env) => env,
        Err(err) => {
            eprintln!("invalid environment configuration: {err}");
            return ExitCode::from(2);
        }
    };
    LoggingBuilder::new().with_level_str(&env.log_level).init();

    match cli.command {
        Command::Run { path } => cmd::run::run(&path, &env).await,
        Command::Lint { path } => cmd::lint::lint(&path),
        Command::New(NewTarget::Recipe {
            name,
            extractor,
            sinks,
            processors,
        }) => cmd::new::new_recipe(&name, extractor, sinks, processors),
    }
}
