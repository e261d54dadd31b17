//! One-shot sync.

use icsync_sync::CycleReport;

use crate::config::AppConfig;
use crate::error::{CliError, CliResult};

use super::build_orchestrator;

/// Runs one cycle and prints the report.
pub async fn run(config: &AppConfig, json: bool) -> CliResult<()> {
    let report = sync_once(config).await?;
    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::Config(format!("failed to serialize report: {}", e)))?;
        println!("{}", out);
    } else {
        println!("{}", report);
    }
    Ok(())
}

/// Runs one cycle and returns its report.
pub async fn sync_once(config: &AppConfig) -> CliResult<CycleReport> {
    let orchestrator = build_orchestrator(config)?;
    Ok(orchestrator.run_cycle(&config.sync).await)
}
