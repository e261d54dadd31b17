//! The normalized calendar event.
//!
//! [`Event`] is what the ICS parser produces and what rendering and upsert
//! consume. It is independent of the parsing library's representation.

use serde::{Deserialize, Serialize};

use crate::time::EventTime;

/// A calendar event as read from one feed fetch.
///
/// Text fields default to empty strings rather than `None`; an event whose
/// `uid` is empty is never synced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The event UID, trimmed of surrounding whitespace.
    pub uid: String,
    /// The event title.
    pub summary: String,
    /// Free-text description.
    pub description: String,
    /// The event location.
    pub location: String,
    /// A URL attached to the event.
    pub url: String,
    /// When the event starts.
    pub starts_at: Option<EventTime>,
    /// When the event ends.
    pub ends_at: Option<EventTime>,
    /// The timezone identifier the source used for start or end, if any.
    pub tzid: Option<String>,
}

impl Event {
    /// Creates an event with the given UID. The UID is trimmed.
    pub fn new(uid: impl AsRef<str>) -> Self {
        Self {
            uid: uid.as_ref().trim().to_string(),
            ..Default::default()
        }
    }

    /// Returns true if the event carries a usable UID.
    pub fn has_uid(&self) -> bool {
        !self.uid.trim().is_empty()
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Builder method to set the URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Builder method to set the start.
    pub fn with_start(mut self, start: EventTime) -> Self {
        self.starts_at = Some(start);
        self
    }

    /// Builder method to set the end.
    pub fn with_end(mut self, end: EventTime) -> Self {
        self.ends_at = Some(end);
        self
    }

    /// Builder method to set the source timezone.
    pub fn with_tzid(mut self, tzid: impl Into<String>) -> Self {
        self.tzid = Some(tzid.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_is_trimmed() {
        let event = Event::new("  abc-123 \n");
        assert_eq!(event.uid, "abc-123");
        assert!(event.has_uid());
    }

    #[test]
    fn whitespace_uid_is_unusable() {
        let event = Event::new("   ");
        assert!(!event.has_uid());
        assert!(!Event::default().has_uid());
    }

    #[test]
    fn builder_sets_fields() {
        let event = Event::new("evt-1")
            .with_summary("Team Sync")
            .with_location("Room 101")
            .with_url("https://example.com/e/1")
            .with_tzid("Europe/Paris");

        assert_eq!(event.summary, "Team Sync");
        assert_eq!(event.location, "Room 101");
        assert_eq!(event.url, "https://example.com/e/1");
        assert_eq!(event.tzid.as_deref(), Some("Europe/Paris"));
        assert!(event.description.is_empty());
        assert!(event.starts_at.is_none());
    }
}
