//! Feed configuration and per-feed fetch state.
//!
//! - [`FeedEntry`]: one raw entry of the JSON feed list, as configured
//! - [`FeedConfig`]: a resolved feed with every default filled in
//! - [`FeedState`]: cached fetch metadata for one feed
//! - [`FeedStatus`]: the outcome recorded by the last fetch attempt

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Number of characters kept from an explicit or derived feed key.
pub const FEED_KEY_LEN: usize = 20;

/// A destination category reference as it appears in the feed list.
///
/// Accepts both `5` and `"5"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum CategoryRef {
    Id(u64),
    Text(String),
}

impl CategoryRef {
    fn id(&self) -> Option<u64> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

/// One entry of the configured feed list.
///
/// Every field is optional at this stage; [`FeedConfig::resolve`] applies
/// defaults and rejects entries without a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FeedEntry {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    category_id: Option<CategoryRef>,
    #[serde(default)]
    pub static_tags: Option<Vec<String>>,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl FeedEntry {
    /// Creates an entry for the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Builder method to set an explicit key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Builder method to set the category.
    pub fn with_category(mut self, category_id: u64) -> Self {
        self.category_id = Some(CategoryRef::Id(category_id));
        self
    }

    /// Builder method to set static tags.
    pub fn with_static_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.static_tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Builder method to set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Returns the configured category, if it is a valid id.
    pub fn category_id(&self) -> Option<u64> {
        self.category_id.as_ref().and_then(CategoryRef::id)
    }
}

/// Site-wide defaults applied when resolving feed entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDefaults {
    /// Category used when a feed does not name one.
    pub category_id: Option<u64>,
    /// Tag namespace used when a feed does not name one.
    pub namespace: Option<String>,
}

/// A feed with its key derived and its defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Stable key used for fetch state and the `ics_source` field.
    pub key: String,
    /// The trimmed feed URL.
    pub url: String,
    /// Destination category for created records.
    pub category_id: Option<u64>,
    /// Tags applied to every event of this feed.
    pub static_tags: Vec<String>,
    /// Prefix applied to every tag, if any.
    pub namespace: Option<String>,
}

impl FeedConfig {
    /// Resolves a raw entry against the site defaults.
    ///
    /// Returns `None` when the entry has no usable URL.
    pub fn resolve(entry: &FeedEntry, defaults: &FeedDefaults) -> Option<Self> {
        let url = entry.url.as_deref().map(str::trim).unwrap_or_default();
        if url.is_empty() {
            return None;
        }

        let namespace = non_blank(entry.namespace.as_deref())
            .or_else(|| non_blank(defaults.namespace.as_deref()))
            .map(str::to_string);

        Some(Self {
            key: derive_feed_key(entry.key.as_deref(), url),
            url: url.to_string(),
            category_id: entry.category_id().or(defaults.category_id),
            static_tags: entry.static_tags.clone().unwrap_or_default(),
            namespace,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Derives the stable key for a feed.
///
/// Uses the explicit key when it is not blank, otherwise the hex SHA-256 of
/// the URL. Either way the result is cut to [`FEED_KEY_LEN`] characters.
pub fn derive_feed_key(explicit: Option<&str>, url: &str) -> String {
    let full = match non_blank(explicit) {
        Some(key) => key.to_string(),
        None => hex::encode(Sha256::digest(url.as_bytes())),
    };
    full.chars().take(FEED_KEY_LEN).collect()
}

/// Error returned when the feed list is not a JSON array.
#[derive(Debug, Error)]
#[error("invalid feed list: {0}")]
pub struct FeedListError(#[from] serde_json::Error);

/// Error returned for one feed-list entry of the wrong shape.
#[derive(Debug, Error)]
#[error("invalid feed entry {index}: {source}")]
pub struct FeedEntryError {
    /// Position of the entry in the list.
    pub index: usize,
    #[source]
    pub source: serde_json::Error,
}

/// Parses the feed-list setting.
///
/// A blank setting is an empty list. Each array element is decoded on its
/// own, so a mistyped entry only fails itself.
pub fn parse_feed_list(
    raw: &str,
) -> Result<Vec<Result<FeedEntry, FeedEntryError>>, FeedListError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let values: Vec<serde_json::Value> = serde_json::from_str(raw)?;
    Ok(values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value(value).map_err(|source| FeedEntryError { index, source })
        })
        .collect())
}

/// Outcome recorded by the most recent fetch of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FeedStatus {
    /// HTTP 200 with a body.
    Fresh,
    /// HTTP 304.
    NotModified,
    /// Any other HTTP status.
    Http(u16),
    /// The request failed before a status was received.
    Error,
}

impl FeedStatus {
    /// Returns the status as it is persisted.
    pub fn as_string(&self) -> String {
        match self {
            Self::Fresh => "200".to_string(),
            Self::NotModified => "304".to_string(),
            Self::Http(code) => code.to_string(),
            Self::Error => "error".to_string(),
        }
    }

    /// Returns true if the attempt failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Error)
    }
}

impl fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<FeedStatus> for String {
    fn from(status: FeedStatus) -> Self {
        status.as_string()
    }
}

impl TryFrom<String> for FeedStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        match value.as_str() {
            "200" => Ok(FeedStatus::Fresh),
            "304" => Ok(FeedStatus::NotModified),
            "error" => Ok(FeedStatus::Error),
            other => other
                .parse::<u16>()
                .map(FeedStatus::Http)
                .map_err(|_| format!("unknown feed status: {other}")),
        }
    }
}

/// Cached fetch metadata for one feed.
///
/// Each fetch attempt replaces the whole value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<FeedStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FeedState {
    /// State after a 200 response.
    pub fn fresh(
        fetched_at: DateTime<Utc>,
        etag: Option<String>,
        last_modified: Option<String>,
    ) -> Self {
        Self {
            etag: etag.filter(|v| !v.is_empty()),
            last_modified: last_modified.filter(|v| !v.is_empty()),
            fetched_at: Some(fetched_at),
            status: Some(FeedStatus::Fresh),
            error: None,
        }
    }

    /// State after a 304 response. The previous validators stay valid.
    pub fn not_modified(fetched_at: DateTime<Utc>, previous: &FeedState) -> Self {
        Self {
            etag: previous.etag.clone(),
            last_modified: previous.last_modified.clone(),
            fetched_at: Some(fetched_at),
            status: Some(FeedStatus::NotModified),
            error: None,
        }
    }

    /// State after a failed attempt.
    pub fn failed(fetched_at: DateTime<Utc>, status: FeedStatus, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            etag: None,
            last_modified: None,
            fetched_at: Some(fetched_at),
            status: Some(status),
            error: (!error.is_empty()).then_some(error),
        }
    }

    /// Returns true if nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
