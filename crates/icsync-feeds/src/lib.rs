//! Feed fetching, fetch-state storage, and ICS parsing.
//!
//! This crate turns a feed URL into calendar events:
//!
//! - [`ConditionalFetcher`] - Conditional GET with cached validators
//! - [`FeedStateStore`] - Per-feed fetch metadata ([`MemoryStateStore`], [`JsonStateStore`])
//! - [`RunMarker`] - The cycle-level "last run" timestamp
//! - [`parse_calendar`] - ICS text to [`icsync_core::Event`]s
//! - [`FeedError`] - Error types for fetch and storage operations
//!
//! # Architecture
//!
//! ```text
//!   feed URL ──▶ ConditionalFetcher ──▶ FetchOutcome::Fresh(body) ──▶ parse_calendar ──▶ Vec<Event>
//!                     │    ▲
//!                     ▼    │
//!                FeedStateStore (etag, last_modified, status)
//! ```

pub mod error;
pub mod fetch;
pub mod ics;
pub mod state;

// Re-export main types at crate root
pub use error::{FeedError, FeedErrorCode, FeedResult};
pub use fetch::{ConditionalFetcher, DEFAULT_USER_AGENT, FetchOutcome, FetcherConfig};
pub use ics::parse_calendar;
pub use state::{
    FeedStateStore, JsonStateStore, MemoryStateStore, RunMarker, write_atomically,
};
