mod cli;

use std::path::Path;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Args, Command};
use storyreel::config::Config;

/// Load .env file. Does not override existing environment variables.
fn load_env() {
    // dotenv::dotenv() returns Err if .env doesn't exist, which is fine
    let _ = dotenv::dotenv();
}

/// Install the log subscriber. `RUST_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,storyreel={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// An explicit `--config` path must exist; the default path may be absent.
fn load_config(path: Option<&Path>) -> Result<Config, String> {
    if let Some(path) = path {
        if !path.exists() {
            return Err(format!("Config file not found: {}", path.display()));
        }
    }
    Config::load(path).map_err(|e| e.to_string())
}

async fn run(args: Args) -> Result<(), String> {
    let config_path = args.config.as_deref();
    let cfg = load_config(config_path)?;

    match args.command {
        Command::Generate(generate) => cli::run_generate(generate, &cfg).await,
        Command::Assemble(assemble) => cli::run_assemble(assemble, &cfg).await,
        Command::Mix(mix) => cli::run_mix(mix, &cfg).await,
        Command::Config { action } => cli::handle_config_action(action, config_path, &cfg),
    }
}

#[tokio::main]
async fn main() {
    // Load .env file before anything else
    load_env();

    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
