//! Sync cycle: rendering, upsert, orchestration, scheduling.
//!
//! This crate turns fetched feeds into destination records:
//! - [`SyncOrchestrator`] runs one cycle over every configured feed
//! - [`UpsertEngine`] keeps exactly one record per event UID
//! - [`EventRenderer`] produces record titles and bodies
//! - [`Destination`] is the record store being written to
//! - [`Scheduler`] runs cycles periodically
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use icsync_core::SystemClock;
//! use icsync_feeds::{ConditionalFetcher, MemoryStateStore};
//! use icsync_sync::{MemoryDestination, SyncOrchestrator, SyncSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let state = Arc::new(MemoryStateStore::new());
//!     let clock = Arc::new(SystemClock);
//!     let fetcher = ConditionalFetcher::new(state.clone(), clock.clone())?;
//!     let orchestrator =
//!         SyncOrchestrator::new(fetcher, Arc::new(MemoryDestination::new()), state, clock);
//!
//!     let settings = SyncSettings::default()
//!         .with_feeds(r#"[{"url": "https://example.com/cal.ics"}]"#);
//!     let report = orchestrator.run_cycle(&settings).await;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```

mod destination;
mod error;
mod orchestrator;
mod render;
mod scheduler;
mod settings;
mod upsert;

pub use destination::{
    BoxFuture, CustomFields, Destination, DestinationRecord, DestinationResult, ICS_SOURCE_FIELD,
    ICS_UID_FIELD, MemoryDestination, NewRecord, RecordId, RecordSet,
};
pub use error::{DestinationError, SyncError, SyncResult};
pub use orchestrator::{CycleReport, SkipReason, SyncOrchestrator, resolve_feeds};
pub use render::{
    EventRenderer, RenderedEvent, UNTITLED_EVENT, escape_attr, parse_uid_marker, render_title,
};
pub use scheduler::{
    Scheduler, SchedulerCommand, SchedulerConfig, SchedulerHandle, SchedulerState,
    SharedSchedulerState,
};
pub use settings::SyncSettings;
pub use upsert::{UpsertEngine, UpsertOutcome};
