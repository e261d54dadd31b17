//! Command implementations.

pub mod check_config;
pub mod daemon;
pub mod once;
pub mod state;

use std::sync::Arc;

use icsync_core::SystemClock;
use icsync_feeds::{ConditionalFetcher, JsonStateStore};
use icsync_sync::SyncOrchestrator;
use tracing::info;

use crate::config::AppConfig;
use crate::error::CliResult;
use crate::store::JsonRecordStore;

/// Builds an orchestrator over the configured state and record files.
pub fn build_orchestrator(config: &AppConfig) -> CliResult<SyncOrchestrator> {
    let state_path = config.storage.state_path();
    let records_path = config.storage.records_path();
    info!(
        state = %state_path.display(),
        records = %records_path.display(),
        "Opening stores"
    );

    let state = Arc::new(JsonStateStore::open(state_path));
    let records = Arc::new(JsonRecordStore::open(records_path)?);
    let clock = Arc::new(SystemClock);
    let fetcher = ConditionalFetcher::new(state.clone(), clock.clone())?;

    Ok(SyncOrchestrator::new(fetcher, records, state, clock))
}
