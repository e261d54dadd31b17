//! Time types for calendar events.
//!
//! This module provides [`EventTime`] for representing event start/end times,
//! which are either an all-day date or an absolute instant in UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Represents the start or end of a calendar event.
///
/// Calendar feeds carry two kinds of times:
/// - **Date**: an all-day value with no time of day and no timezone
/// - **Instant**: a specific point in time, normalized to UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EventTime {
    /// An all-day date.
    Date(NaiveDate),
    /// A specific instant, stored in UTC.
    Instant(DateTime<Utc>),
}

impl EventTime {
    /// Creates an `EventTime::Instant` from a UTC datetime.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self::Instant(dt)
    }

    /// Creates an `EventTime::Instant` from a datetime in any timezone.
    pub fn from_zoned<Tz: TimeZone>(dt: DateTime<Tz>) -> Self {
        Self::Instant(dt.with_timezone(&Utc))
    }

    /// Creates an `EventTime::Instant` by reading a wall-clock time as UTC.
    pub fn from_naive_utc(naive: NaiveDateTime) -> Self {
        Self::Instant(Utc.from_utc_datetime(&naive))
    }

    /// Creates an `EventTime::Date` for an all-day value.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::Date(date)
    }

    /// Returns `true` if this is an all-day value.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    /// Returns the instant if this is an `Instant` variant.
    pub fn as_instant(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Instant(dt) => Some(dt),
            Self::Date(_) => None,
        }
    }

    /// Formats the value for rendered output.
    ///
    /// Dates render as `YYYY-MM-DD`, instants as `YYYY-MM-DDTHH:MM:SSZ`.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Date(date) => date.format("%Y-%m-%d").to_string(),
            Self::Instant(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }
    }
}

impl std::fmt::Display for EventTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_display_string())
    }
}
