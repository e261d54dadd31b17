//! Prints the cached fetch state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use icsync_core::FeedState;
use icsync_feeds::{JsonStateStore, RunMarker};
use serde::Serialize;

use crate::config::AppConfig;
use crate::error::{CliError, CliResult};

#[derive(Debug, Serialize)]
struct StateDump {
    last_run_at: Option<DateTime<Utc>>,
    feeds: BTreeMap<String, FeedState>,
}

/// Prints the state file as JSON.
pub fn run(config: &AppConfig) -> CliResult<()> {
    let store = JsonStateStore::open(config.storage.state_path());
    let dump = StateDump {
        last_run_at: store.last_run(),
        feeds: store.snapshot(),
    };
    let out = serde_json::to_string_pretty(&dump)
        .map_err(|e| CliError::Config(format!("failed to serialize state: {}", e)))?;
    println!("{}", out);
    Ok(())
}
