//! Core types: events, feed configuration, feed state, tags, clock, tracing

pub mod clock;
pub mod event;
pub mod feed;
pub mod tags;
pub mod time;
pub mod tracing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use event::Event;
pub use feed::{
    FEED_KEY_LEN, FeedConfig, FeedDefaults, FeedEntry, FeedEntryError, FeedListError, FeedState, FeedStatus,
    derive_feed_key, parse_feed_list,
};
pub use tags::{DEFAULT_MAX_TAG_LENGTH, merge_tags, normalize_tags, split_tag_list};
pub use time::EventTime;
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
