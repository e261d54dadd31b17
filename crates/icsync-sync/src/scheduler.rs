//! Periodic scheduling of sync cycles.
//!
//! The scheduler runs one cycle per period with:
//! - Jitter so many instances do not hit the same feeds at once
//! - Exponential backoff when a cycle cannot run at all
//! - Commands to sync immediately, pause, resume, or stop
//!
//! Cycles never overlap: the loop awaits each cycle before sleeping again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};

use crate::error::SyncError;
use crate::orchestrator::CycleReport;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Base interval between cycles.
    pub interval: Duration,
    /// Maximum jitter added to the interval (as fraction 0.0-1.0).
    pub jitter_fraction: f64,
    /// Initial backoff duration on error.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            jitter_fraction: 0.05,
            initial_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(1800),
            backoff_multiplier: 2.0,
        }
    }
}

impl SchedulerConfig {
    /// Creates a config with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Builder: set jitter fraction.
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Builder: set backoff parameters.
    pub fn with_backoff(mut self, initial: Duration, max: Duration, multiplier: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.backoff_multiplier = multiplier;
        self
    }

    /// Returns the delay before the next cycle, with jitter.
    pub fn next_delay(&self) -> Duration {
        let base = self.interval.as_secs_f64();
        let jitter = rand_jitter(base * self.jitter_fraction);
        Duration::from_secs_f64((base + jitter).max(0.0))
    }

    /// Returns the backoff delay after `consecutive_failures` failures.
    pub fn backoff_delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_backoff.as_secs_f64();
        let exponent = i32::try_from(consecutive_failures - 1).unwrap_or(i32::MAX);
        let delay = base * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_backoff.as_secs_f64()))
    }
}

/// Pseudo-random value in [-range, range], seeded from the clock.
fn rand_jitter(range: f64) -> f64 {
    use std::time::SystemTime;

    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();

    let fraction = f64::from(nanos) / 1_000_000_000.0;
    (fraction * 2.0 - 1.0) * range
}

/// Commands accepted by a running scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Run a cycle now.
    SyncNow,
    /// Stop running cycles on the timer.
    Pause,
    /// Resume timed cycles.
    Resume,
    /// Stop the scheduler.
    Stop,
}

/// What the scheduler has done so far.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    /// Whether timed cycles are paused.
    pub paused: bool,
    /// Number of cycles in a row that could not run.
    pub consecutive_failures: u32,
    /// When the last cycle finished.
    pub last_cycle: Option<DateTime<Utc>>,
    /// The report of the last cycle.
    pub last_report: Option<CycleReport>,
    /// The last error, cleared by a successful cycle.
    pub last_error: Option<String>,
}

impl SchedulerState {
    /// Records a completed cycle.
    pub fn record_success(&mut self, report: CycleReport) {
        self.consecutive_failures = 0;
        self.last_cycle = Some(Utc::now());
        self.last_report = Some(report);
        self.last_error = None;
    }

    /// Records a cycle that could not run.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.consecutive_failures += 1;
        self.last_error = Some(error.into());
    }
}

/// Shared scheduler state.
pub type SharedSchedulerState = Arc<RwLock<SchedulerState>>;

/// Runs sync cycles on a timer.
pub struct Scheduler {
    config: SchedulerConfig,
    state: SharedSchedulerState,
    command_tx: mpsc::Sender<SchedulerCommand>,
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

impl Scheduler {
    /// Creates a scheduler.
    pub fn new(config: SchedulerConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        Self {
            config,
            state: Arc::new(RwLock::new(SchedulerState::default())),
            command_tx,
            command_rx,
        }
    }

    /// Returns a handle for sending commands.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            command_tx: self.command_tx.clone(),
            state: self.state.clone(),
        }
    }

    /// Runs cycles until stopped. The first cycle runs immediately.
    ///
    /// `cycle` returns an error only when a cycle could not run at all, for
    /// example because the configuration became unreadable.
    pub async fn run<F, Fut>(mut self, cycle: F)
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<CycleReport, SyncError>> + Send,
    {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Scheduler started"
        );

        self.run_cycle(&cycle).await;

        loop {
            let delay = self.next_delay().await;
            debug!(delay_secs = delay.as_secs(), "Scheduling next cycle");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if self.state.read().await.paused {
                        debug!("Scheduler paused, skipping cycle");
                        continue;
                    }
                    self.run_cycle(&cycle).await;
                }
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::SyncNow) => {
                            debug!("Received SyncNow command");
                            self.run_cycle(&cycle).await;
                        }
                        Some(SchedulerCommand::Pause) => {
                            info!("Scheduler paused");
                            self.state.write().await.paused = true;
                        }
                        Some(SchedulerCommand::Resume) => {
                            info!("Scheduler resumed");
                            self.state.write().await.paused = false;
                        }
                        Some(SchedulerCommand::Stop) | None => {
                            info!("Scheduler stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn next_delay(&self) -> Duration {
        let failures = self.state.read().await.consecutive_failures;
        if failures > 0 {
            let backoff = self.config.backoff_delay(failures);
            debug!(failures, backoff_secs = backoff.as_secs(), "Using backoff delay");
            return backoff;
        }
        self.config.next_delay()
    }

    async fn run_cycle<F, Fut>(&self, cycle: &F)
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<CycleReport, SyncError>>,
    {
        match cycle().await {
            Ok(report) => {
                debug!(%report, "Cycle completed");
                self.state.write().await.record_success(report);
            }
            Err(e) => {
                let mut state = self.state.write().await;
                state.record_failure(e.to_string());
                if state.consecutive_failures > 1 {
                    error!(error = %e, failures = state.consecutive_failures, "Sync cycle failed again");
                } else {
                    warn!(error = %e, "Sync cycle failed");
                }
            }
        }
    }
}

/// Handle for sending commands to a running scheduler.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    state: SharedSchedulerState,
}

impl SchedulerHandle {
    /// Runs a cycle now.
    pub async fn sync_now(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::SyncNow).await
    }

    /// Pauses timed cycles.
    pub async fn pause(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Pause).await
    }

    /// Resumes timed cycles.
    pub async fn resume(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Resume).await
    }

    /// Stops the scheduler.
    pub async fn stop(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Stop).await
    }

    /// Returns a snapshot of the scheduler state.
    pub async fn state(&self) -> SchedulerState {
        self.state.read().await.clone()
    }

    /// Returns true if timed cycles are paused.
    pub async fn is_paused(&self) -> bool {
        self.state.read().await.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.interval, Duration::from_secs(300));
        assert!(config.jitter_fraction > 0.0);
    }

    #[test]
    fn next_delay_stays_within_jitter() {
        let config = SchedulerConfig::new(Duration::from_secs(60)).with_jitter(0.1);
        let delay = config.next_delay().as_secs_f64();
        assert!((54.0..=66.0).contains(&delay));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = SchedulerConfig::default().with_backoff(
            Duration::from_secs(5),
            Duration::from_secs(300),
            2.0,
        );

        assert_eq!(config.backoff_delay(0), Duration::ZERO);
        assert_eq!(config.backoff_delay(1), Duration::from_secs(5));
        assert_eq!(config.backoff_delay(2), Duration::from_secs(10));
        assert_eq!(config.backoff_delay(3), Duration::from_secs(20));
        assert_eq!(config.backoff_delay(10), Duration::from_secs(300));
    }

    #[test]
    fn state_tracks_failures() {
        let mut state = SchedulerState::default();
        state.record_failure("config unreadable");
        state.record_failure("config unreadable");
        assert_eq!(state.consecutive_failures, 2);

        state.record_success(CycleReport::default());
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.last_error.is_none());
        assert!(state.last_cycle.is_some());
    }

    #[tokio::test]
    async fn scheduler_commands() {
        let scheduler = Scheduler::new(SchedulerConfig::new(Duration::from_secs(60)));
        let handle = scheduler.handle();

        let cycles = Arc::new(AtomicU32::new(0));
        let counter = cycles.clone();
        let task = tokio::spawn(async move {
            scheduler
                .run(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, SyncError>(CycleReport::default())
                    }
                })
                .await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cycles.load(Ordering::SeqCst) >= 1);

        handle.sync_now().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cycles.load(Ordering::SeqCst) >= 2);
        assert!(handle.state().await.last_report.is_some());

        handle.pause().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(handle.is_paused().await);

        handle.resume().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_paused().await);

        handle.stop().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn scheduler_backs_off_then_recovers() {
        let config = SchedulerConfig::new(Duration::from_secs(60)).with_backoff(
            Duration::from_millis(10),
            Duration::from_millis(40),
            2.0,
        );
        let scheduler = Scheduler::new(config);
        let handle = scheduler.handle();

        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let task = tokio::spawn(async move {
            scheduler
                .run(move || {
                    let counter = counter.clone();
                    async move {
                        let n = counter.fetch_add(1, Ordering::SeqCst);
                        if n < 3 {
                            Err(SyncError::config(format!("unreadable {n}")))
                        } else {
                            Ok(CycleReport::default())
                        }
                    }
                })
                .await;
        });

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(attempts.load(Ordering::SeqCst) >= 4);
        let state = handle.state().await;
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.last_error.is_none());

        handle.stop().await.unwrap();
        task.await.unwrap();
    }
}
