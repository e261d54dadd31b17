//! ICS/iCalendar parsing.
//!
//! This module parses iCalendar (RFC 5545) text and converts each VEVENT to
//! an [`Event`].

use chrono::{LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use icalendar::{Calendar, CalendarComponent, CalendarDateTime, Component, DatePerhapsTime, EventLike};
use icsync_core::{Event, EventTime};
use tracing::{debug, warn};

/// Parses ICS text and returns its events in source order.
///
/// Malformed input is logged and yields no events. Components other than
/// VEVENT are ignored.
pub fn parse_calendar(ics: &str) -> Vec<Event> {
    let calendar = match ics.parse::<Calendar>() {
        Ok(cal) => cal,
        Err(e) => {
            warn!(error = %e, "Failed to parse ICS content");
            return Vec::new();
        }
    };

    let events: Vec<Event> = calendar
        .iter()
        .filter_map(|component| match component {
            CalendarComponent::Event(event) => Some(convert_event(event)),
            _ => None,
        })
        .collect();

    debug!(count = events.len(), "Parsed ICS content");
    events
}

fn convert_event(source: &icalendar::Event) -> Event {
    let mut event = Event::new(source.get_uid().unwrap_or_default())
        .with_summary(source.get_summary().unwrap_or_default())
        .with_description(source.get_description().unwrap_or_default())
        .with_location(source.get_location().unwrap_or_default())
        .with_url(source.property_value("URL").unwrap_or_default());

    let start = source.get_start();
    let end = source.get_end();

    event.tzid = start
        .as_ref()
        .and_then(tzid_of)
        .or_else(|| end.as_ref().and_then(tzid_of));
    event.starts_at = start.map(convert_date_time);
    event.ends_at = end.map(convert_date_time);

    event
}

fn tzid_of(dt: &DatePerhapsTime) -> Option<String> {
    match dt {
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { tzid, .. }) => {
            Some(tzid.trim().to_string()).filter(|t| !t.is_empty())
        }
        _ => None,
    }
}

/// Converts a start or end value into an [`EventTime`].
fn convert_date_time(dt: DatePerhapsTime) -> EventTime {
    match dt {
        DatePerhapsTime::Date(date) => EventTime::from_date(date),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => EventTime::from_utc(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => {
            EventTime::from_naive_utc(naive)
        }
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            resolve_zoned(date_time, &tzid)
        }
    }
}

/// Resolves a wall-clock time in `tzid` to an instant.
///
/// Unknown zones and nonexistent local times read the wall clock as UTC.
/// Ambiguous local times take the earlier instant.
fn resolve_zoned(local: NaiveDateTime, tzid: &str) -> EventTime {
    let Ok(tz) = tzid.trim().parse::<Tz>() else {
        debug!(tzid, "Unknown TZID, reading time as UTC");
        return EventTime::from_naive_utc(local);
    };

    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => EventTime::from_zoned(dt),
        LocalResult::Ambiguous(earliest, _) => EventTime::from_zoned(earliest),
        LocalResult::None => {
            debug!(tzid, local = %local, "Nonexistent local time, reading as UTC");
            EventTime::from_naive_utc(local)
        }
    }
}
