//! Daemon command: runs sync cycles in the foreground until a shutdown signal.
//!
//! - SIGTERM/SIGINT stop the scheduler after the current cycle
//! - SIGHUP runs a cycle immediately

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use icsync_sync::{Scheduler, SchedulerConfig, SchedulerHandle, SyncError};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::CliResult;

use super::build_orchestrator;

/// Starts the daemon.
///
/// Sync settings are re-read from `config_path` before every cycle, so edits
/// to the feed list take effect without a restart. Storage paths are fixed
/// at startup.
pub async fn run(
    config_path: Option<PathBuf>,
    config: &AppConfig,
    interval: Option<u64>,
) -> CliResult<()> {
    let orchestrator = Arc::new(build_orchestrator(config)?);
    let interval = Duration::from_secs(interval.unwrap_or(config.daemon.interval_secs).max(1));

    let scheduler = Scheduler::new(SchedulerConfig::new(interval));
    let handle = scheduler.handle();

    let scheduler_task = tokio::spawn(async move {
        scheduler
            .run(move || {
                let orchestrator = orchestrator.clone();
                let config_path = config_path.clone();
                async move {
                    let config = AppConfig::load(config_path.as_deref())
                        .map_err(|e| SyncError::config(e.to_string()))?;
                    Ok::<_, SyncError>(orchestrator.run_cycle(&config.sync).await)
                }
            })
            .await;
    });

    wait_for_shutdown(&handle).await;

    info!("Shutting down...");
    if let Err(e) = handle.stop().await {
        warn!(error = %e, "Failed to send stop command to scheduler");
    }

    // Give the current cycle a moment to finish
    let _ = tokio::time::timeout(Duration::from_secs(5), scheduler_task).await;

    info!("Daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal, triggering a sync on every SIGHUP.
#[cfg(unix)]
async fn wait_for_shutdown(handle: &SchedulerHandle) {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigterm, mut sighup) =
        match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
            (Ok(term), Ok(hup)) => (term, hup),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Failed to install signal handlers, waiting for Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, initiating shutdown");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating shutdown");
                break;
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, syncing now");
                if let Err(e) = handle.sync_now().await {
                    warn!(error = %e, "Scheduler is gone");
                    break;
                }
            }
        }
    }
}

/// Waits for Ctrl-C.
#[cfg(not(unix))]
async fn wait_for_shutdown(_handle: &SchedulerHandle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl-C, initiating shutdown");
    }
}
