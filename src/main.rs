mod cli;
mod commands;
mod config;
mod error;
mod model;
mod schema;
mod scoring;
mod session;
mod store;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, ReferencesCommand};

/// Used when `RUST_LOG` is unset: this crate's events at info, dependencies at warn.
const DEFAULT_LOG_FILTER: &str = "warn,qa_leaderboard=info";

fn main() {
    init_tracing();

    if let Err(err) = run() {
        report_failure(&err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit(args) => commands::submit::run(args),
        Commands::Leaderboard(args) => commands::leaderboard::run(args),
        Commands::Explore(args) => commands::explore::run(args),
        Commands::References(ReferencesCommand::Import(args)) => {
            commands::references::import(args)
        }
        Commands::Status(args) => commands::status::run(args),
    }
}

fn report_failure(err: &anyhow::Error) {
    error!(error = %err, "command failed");
    for cause in err.chain().skip(1) {
        error!(cause = %cause, "caused by");
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
