//! Conditional HTTP fetching of calendar feeds.
//!
//! [`ConditionalFetcher`] sends the validators cached from the previous
//! fetch (`If-None-Match`, `If-Modified-Since`) and records exactly one
//! [`FeedState`] per call, whatever the outcome.

use std::sync::Arc;
use std::time::Duration;

use icsync_core::{Clock, FeedState, FeedStatus};
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode, redirect};
use tracing::{debug, info, warn};

use crate::error::{FeedError, FeedResult};
use crate::state::FeedStateStore;

/// Default User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("icsync/", env!("CARGO_PKG_VERSION"));

/// HTTP settings for [`ConditionalFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
    /// Time allowed between reads of the response.
    pub read_timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
    /// Maximum number of redirects followed.
    pub max_redirects: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(20),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_redirects: 5,
        }
    }
}

/// The result of one conditional fetch.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The server returned new content.
    Fresh(String),
    /// The cached content is still current.
    NotModified,
    /// The fetch failed; the failure is already recorded in the state store.
    Error(FeedError),
}

impl FetchOutcome {
    /// Returns true for [`FetchOutcome::Fresh`].
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }
}

/// Fetches feeds with conditional GET and records the outcome.
pub struct ConditionalFetcher {
    client: Client,
    store: Arc<dyn FeedStateStore>,
    clock: Arc<dyn Clock>,
}

impl ConditionalFetcher {
    /// Creates a fetcher with the default HTTP settings.
    pub fn new(store: Arc<dyn FeedStateStore>, clock: Arc<dyn Clock>) -> FeedResult<Self> {
        Self::with_config(FetcherConfig::default(), store, clock)
    }

    /// Creates a fetcher with custom HTTP settings.
    pub fn with_config(
        config: FetcherConfig,
        store: Arc<dyn FeedStateStore>,
        clock: Arc<dyn Clock>,
    ) -> FeedResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .user_agent(&config.user_agent)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| {
                FeedError::configuration(format!("failed to create HTTP client: {e}"))
                    .with_source(e)
            })?;

        Ok(Self {
            client,
            store,
            clock,
        })
    }

    /// Fetches `url`, using and updating the state stored under `key`.
    ///
    /// Transport failures and unexpected statuses are not retried; they are
    /// recorded and returned as [`FetchOutcome::Error`].
    pub async fn fetch(&self, url: &str, key: &str) -> FetchOutcome {
        let previous = self.store.get(key);

        let mut request = self.client.get(url);
        if let Some(etag) = previous.etag.as_deref() {
            request = request.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = previous.last_modified.as_deref() {
            request = request.header(IF_MODIFIED_SINCE, last_modified);
        }

        debug!(feed = %key, url = %url, "Fetching feed");
        let (outcome, state) = match request.send().await {
            Ok(response) => {
                let status = response.status();
                match status {
                    StatusCode::OK => {
                        let etag = header_value(&response, ETAG);
                        let last_modified = header_value(&response, LAST_MODIFIED);
                        match response.text().await {
                            Ok(body) => (
                                FetchOutcome::Fresh(body),
                                FeedState::fresh(self.clock.now(), etag, last_modified),
                            ),
                            Err(e) => self.failure(
                                FeedStatus::Error,
                                FeedError::network(format!("failed to read body: {e}"))
                                    .with_source(e),
                            ),
                        }
                    }
                    StatusCode::NOT_MODIFIED => (
                        FetchOutcome::NotModified,
                        FeedState::not_modified(self.clock.now(), &previous),
                    ),
                    other => self.failure(
                        FeedStatus::Http(other.as_u16()),
                        FeedError::http(format!("unexpected status {other}")),
                    ),
                }
            }
            Err(e) => self.failure(
                FeedStatus::Error,
                FeedError::network(describe_transport_error(&e)).with_source(e),
            ),
        };

        match &outcome {
            FetchOutcome::Fresh(body) => {
                info!(feed = %key, status = %FeedStatus::Fresh, bytes = body.len(), "Feed updated");
            }
            FetchOutcome::NotModified => {
                debug!(feed = %key, status = %FeedStatus::NotModified, "Feed not modified");
            }
            FetchOutcome::Error(e) => {
                warn!(feed = %key, status = ?state.status, error = %e.message(), "Feed fetch failed");
            }
        }

        if let Err(e) = self.store.set(key, state) {
            warn!(feed = %key, error = %e, "Failed to record feed state");
        }

        match outcome {
            FetchOutcome::Error(e) => FetchOutcome::Error(e.with_feed(key)),
            other => other,
        }
    }

    fn failure(&self, status: FeedStatus, error: FeedError) -> (FetchOutcome, FeedState) {
        let state = FeedState::failed(self.clock.now(), status, error.message());
        (FetchOutcome::Error(error), state)
    }
}

fn header_value(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else if e.is_redirect() {
        format!("too many redirects: {e}")
    } else {
        format!("request failed: {e}")
    }
}
