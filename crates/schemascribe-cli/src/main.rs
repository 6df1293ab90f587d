use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;
mod commands;

use args::{Cli, Command};

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // RUST_LOG wins; otherwise warn, or info with --verbose
    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Command::Enrich(args) => commands::enrich::run(&cli, args).await,
        Command::Batch(args) => commands::batch::run(&cli, args).await,
        Command::Compile(args) => commands::compile::run(&cli, args).await,
        Command::Inspect(args) => commands::inspect::run(&cli, args).await,
        Command::Tracker(args) => commands::tracker::run(&cli, args).await,
    };

    if let Err(err) = result {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
