//! Sync settings.

use icsync_core::{DEFAULT_MAX_TAG_LENGTH, FeedConfig, FeedDefaults, normalize_tags, split_tag_list};
use serde::{Deserialize, Serialize};

/// Settings read at the start of every sync cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Global enable flag. A disabled cycle does nothing.
    pub enabled: bool,

    /// Minimum minutes between cycles. Zero disables the gate.
    pub fetch_interval_mins: u64,

    /// Comma-separated tags applied to every synced record.
    pub default_tags: String,

    /// Category used when a feed does not name one.
    pub default_category: Option<u64>,

    /// Maximum tag length, in characters.
    pub max_tag_length: usize,

    /// Tag prefix applied when a feed does not name one.
    pub namespace: String,

    /// Timezone written into rendered bodies when an event carries none.
    pub display_timezone: String,

    /// Identity that creates records.
    pub actor: String,

    /// The feed list, as a JSON array.
    pub feeds: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            fetch_interval_mins: 0,
            default_tags: String::new(),
            default_category: None,
            max_tag_length: DEFAULT_MAX_TAG_LENGTH,
            namespace: String::new(),
            display_timezone: "UTC".to_string(),
            actor: "system".to_string(),
            feeds: String::new(),
        }
    }
}

impl SyncSettings {
    /// Builder: set the feed list JSON.
    pub fn with_feeds(mut self, feeds: impl Into<String>) -> Self {
        self.feeds = feeds.into();
        self
    }

    /// Builder: set the default tags.
    pub fn with_default_tags(mut self, tags: impl Into<String>) -> Self {
        self.default_tags = tags.into();
        self
    }

    /// Builder: set the default category.
    pub fn with_default_category(mut self, category_id: u64) -> Self {
        self.default_category = Some(category_id);
        self
    }

    /// Builder: set the fetch interval.
    pub fn with_fetch_interval(mut self, minutes: u64) -> Self {
        self.fetch_interval_mins = minutes;
        self
    }

    /// Builder: set the enable flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder: set the global namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Returns the default tags as a list.
    pub fn default_tag_list(&self) -> Vec<String> {
        split_tag_list(&self.default_tags)
    }

    /// Returns the defaults used to resolve feed entries.
    pub fn feed_defaults(&self) -> FeedDefaults {
        FeedDefaults {
            category_id: self.default_category,
            namespace: Some(self.namespace.trim().to_string()).filter(|ns| !ns.is_empty()),
        }
    }

    /// Returns the normalized tags applied to every event of `feed`.
    ///
    /// Default tags come first, then the feed's static tags.
    pub fn tags_for(&self, feed: &FeedConfig) -> Vec<String> {
        normalize_tags(
            self.default_tag_list().iter().chain(feed.static_tags.iter()),
            feed.namespace.as_deref(),
            self.max_tag_length,
        )
    }

    /// Returns the configured display timezone, if not blank.
    pub fn site_timezone(&self) -> Option<&str> {
        Some(self.display_timezone.trim()).filter(|tz| !tz.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use icsync_core::FeedEntry;

    #[test]
    fn defaults() {
        let settings = SyncSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.fetch_interval_mins, 0);
        assert_eq!(settings.max_tag_length, 20);
        assert_eq!(settings.site_timezone(), Some("UTC"));
        assert_eq!(settings.actor, "system");
        assert!(settings.default_tag_list().is_empty());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let settings: SyncSettings =
            serde_json::from_str(r#"{"default_tags": "calendar, events"}"#).unwrap();
        assert_eq!(settings.default_tag_list(), vec!["calendar", "events"]);
        assert!(settings.enabled);
        assert_eq!(settings.max_tag_length, 20);
    }

    #[test]
    fn feed_tags_combine_defaults_and_namespace() {
        let settings = SyncSettings::default()
            .with_default_tags("Calendar")
            .with_namespace("club");
        let entry = FeedEntry::new("https://example.com/a.ics").with_static_tags(["Meet Up"]);
        let feed = FeedConfig::resolve(&entry, &settings.feed_defaults()).unwrap();

        assert_eq!(settings.tags_for(&feed), vec!["club-calendar", "club-meet-up"]);

        let own = FeedConfig::resolve(&entry.with_namespace("own"), &settings.feed_defaults())
            .unwrap();
        assert_eq!(settings.tags_for(&own), vec!["own-calendar", "own-meet-up"]);
    }

    #[test]
    fn blank_namespace_and_timezone_are_none() {
        let settings = SyncSettings {
            display_timezone: " ".to_string(),
            ..SyncSettings::default()
        }
        .with_namespace("  ")
        .with_default_category(5);

        assert!(settings.site_timezone().is_none());
        let defaults = settings.feed_defaults();
        assert!(defaults.namespace.is_none());
        assert_eq!(defaults.category_id, Some(5));
    }
}
