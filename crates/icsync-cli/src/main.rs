//! icsync CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use icsync_cli::cli::{Cli, Command};
use icsync_cli::commands;
use icsync_cli::config::AppConfig;
use icsync_cli::error::CliResult;
use icsync_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(TracingConfig::from_flags(cli.debug, cli.json_logs)) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Once { json } => commands::once::run(&config, json).await,
        Command::Daemon { interval } => commands::daemon::run(cli.config, &config, interval).await,
        Command::State => commands::state::run(&config),
        Command::CheckConfig => commands::check_config::run(&config),
    }
}
