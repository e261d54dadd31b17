//! One sync cycle: gate, feed list, fetch, parse, upsert.

use std::fmt;
use std::sync::Arc;

use icsync_core::{Clock, FeedConfig, parse_feed_list};
use icsync_feeds::{ConditionalFetcher, FetchOutcome, RunMarker, parse_calendar};
use serde::Serialize;
use tracing::{Span, debug, info, warn};

use crate::destination::Destination;
use crate::settings::SyncSettings;
use crate::upsert::{UpsertEngine, UpsertOutcome};

/// Why a cycle did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Syncing is turned off.
    Disabled,
    /// The minimum interval since the last cycle has not passed.
    IntervalNotElapsed,
}

/// Counts of what one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
    pub feeds: usize,
    pub fresh: usize,
    pub not_modified: usize,
    pub fetch_failed: usize,
    pub events_created: usize,
    pub events_updated: usize,
    pub events_unchanged: usize,
    pub events_skipped: usize,
    pub events_failed: usize,
}

impl CycleReport {
    /// A report for a cycle that did nothing.
    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Default::default()
        }
    }

    /// Returns true if the cycle was skipped.
    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Skipped => self.events_skipped += 1,
            UpsertOutcome::Created(_) => self.events_created += 1,
            UpsertOutcome::Updated { .. } => self.events_updated += 1,
            UpsertOutcome::Unchanged(_) => self.events_unchanged += 1,
        }
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.skipped {
            Some(SkipReason::Disabled) => write!(f, "skipped: sync is disabled"),
            Some(SkipReason::IntervalNotElapsed) => {
                write!(f, "skipped: fetch interval has not elapsed")
            }
            None => write!(
                f,
                "feeds: {} ({} fresh, {} not modified, {} failed); events: {} created, {} updated, {} unchanged, {} skipped, {} failed",
                self.feeds,
                self.fresh,
                self.not_modified,
                self.fetch_failed,
                self.events_created,
                self.events_updated,
                self.events_unchanged,
                self.events_skipped,
                self.events_failed,
            ),
        }
    }
}

/// Runs sync cycles against one destination.
pub struct SyncOrchestrator {
    fetcher: ConditionalFetcher,
    destination: Arc<dyn Destination>,
    marker: Arc<dyn RunMarker>,
    clock: Arc<dyn Clock>,
}

impl SyncOrchestrator {
    /// Creates an orchestrator.
    pub fn new(
        fetcher: ConditionalFetcher,
        destination: Arc<dyn Destination>,
        marker: Arc<dyn RunMarker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            fetcher,
            destination,
            marker,
            clock,
        }
    }

    /// Runs one cycle with the given settings.
    ///
    /// Nothing inside a cycle fails it: bad feed lists, failed fetches, and
    /// rejected events are logged and counted.
    #[tracing::instrument(skip_all, fields(feeds))]
    pub async fn run_cycle(&self, settings: &SyncSettings) -> CycleReport {
        if !settings.enabled {
            debug!("Sync disabled, skipping cycle");
            return CycleReport::skipped(SkipReason::Disabled);
        }

        if !self.pass_interval_gate(settings.fetch_interval_mins) {
            return CycleReport::skipped(SkipReason::IntervalNotElapsed);
        }

        let feeds = resolve_feeds(settings);
        Span::current().record("feeds", feeds.len());

        let engine = UpsertEngine::new(self.destination.clone(), settings);
        let mut report = CycleReport {
            feeds: feeds.len(),
            ..Default::default()
        };

        for feed in &feeds {
            self.sync_feed(&engine, feed, &mut report).await;
        }

        info!(
            feeds = report.feeds,
            fresh = report.fresh,
            not_modified = report.not_modified,
            fetch_failed = report.fetch_failed,
            created = report.events_created,
            updated = report.events_updated,
            unchanged = report.events_unchanged,
            skipped = report.events_skipped,
            failed = report.events_failed,
            "Sync cycle finished"
        );
        report
    }

    /// Returns false when the cycle should be skipped. Records the run
    /// otherwise.
    fn pass_interval_gate(&self, interval_mins: u64) -> bool {
        if interval_mins < 1 {
            return true;
        }

        let now = self.clock.now();
        if let Some(last) = self.marker.last_run() {
            let elapsed = (now - last).num_minutes();
            if elapsed < i64::try_from(interval_mins).unwrap_or(i64::MAX) {
                debug!(elapsed_mins = elapsed, interval_mins, "Fetch interval not elapsed");
                return false;
            }
        }

        if let Err(e) = self.marker.set_last_run(now) {
            warn!(error = %e, "Failed to record last run");
        }
        true
    }

    async fn sync_feed(&self, engine: &UpsertEngine, feed: &FeedConfig, report: &mut CycleReport) {
        let body = match self.fetcher.fetch(&feed.url, &feed.key).await {
            FetchOutcome::Fresh(body) => {
                report.fresh += 1;
                body
            }
            FetchOutcome::NotModified => {
                report.not_modified += 1;
                return;
            }
            FetchOutcome::Error(_) => {
                report.fetch_failed += 1;
                return;
            }
        };

        let events = parse_calendar(&body);
        debug!(feed = %feed.key, events = events.len(), "Processing feed events");

        for event in &events {
            match engine.upsert(event, feed).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    report.events_failed += 1;
                    warn!(feed = %feed.key, uid = %event.uid, error = %e, "Failed to sync event");
                }
            }
        }
    }
}

/// Parses and resolves the configured feed list.
///
/// A list that is not a JSON array is logged and treated as empty. Mistyped
/// entries and entries without a URL are logged and dropped.
pub fn resolve_feeds(settings: &SyncSettings) -> Vec<FeedConfig> {
    let entries = match parse_feed_list(&settings.feeds) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "Malformed feed list, no feeds will be synced");
            return Vec::new();
        }
    };

    let defaults = settings.feed_defaults();
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(index, error = %e.source, "Skipping malformed feed entry");
                    return None;
                }
            };
            let feed = FeedConfig::resolve(entry, &defaults);
            if feed.is_none() {
                warn!(index, "Skipping feed entry without a URL");
            }
            feed
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::{ICS_SOURCE_FIELD, ICS_UID_FIELD, MemoryDestination};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use icsync_core::{FeedStatus, ManualClock, derive_feed_key};
    use icsync_feeds::{FeedStateStore, MemoryStateStore};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEAM_SYNC_ICS: &str = "BEGIN:VCALENDAR\r\n\
        VERSION:2.0\r\n\
        PRODID:-//Test//Test//EN\r\n\
        BEGIN:VEVENT\r\n\
        UID:abc-123\r\n\
        DTSTART:20240601T100000Z\r\n\
        DTEND:20240601T110000Z\r\n\
        SUMMARY:Team Sync\r\n\
        END:VEVENT\r\n\
        BEGIN:VEVENT\r\n\
        UID:   \r\n\
        DTSTART:20240602T100000Z\r\n\
        SUMMARY:No identity\r\n\
        END:VEVENT\r\n\
        END:VCALENDAR\r\n";

    struct Harness {
        orchestrator: SyncOrchestrator,
        destination: Arc<MemoryDestination>,
        state: Arc<MemoryStateStore>,
        clock: Arc<ManualClock>,
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn harness_with(destination: MemoryDestination) -> Harness {
        let destination = Arc::new(destination);
        let state = Arc::new(MemoryStateStore::new());
        let clock = Arc::new(ManualClock::new(start()));
        let fetcher = ConditionalFetcher::new(state.clone(), clock.clone()).unwrap();
        let orchestrator =
            SyncOrchestrator::new(fetcher, destination.clone(), state.clone(), clock.clone());
        Harness {
            orchestrator,
            destination,
            state,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(MemoryDestination::new())
    }

    fn feeds_json(server: &MockServer) -> String {
        format!(r#"[{{"url": "{}/team.ics", "key": "team"}}]"#, server.uri())
    }

    async fn serve_with_etag(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/team.ics"))
            .and(header("If-None-Match", "\"v1\""))
            .respond_with(ResponseTemplate::new(304))
            .with_priority(1)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/team.ics"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"v1\"")
                    .set_body_string(TEAM_SYNC_ICS),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn syncs_team_sync_once_and_skips_blank_uid() {
        let server = MockServer::start().await;
        serve_with_etag(&server).await;
        let h = harness();
        let settings = SyncSettings::default().with_feeds(feeds_json(&server));

        let report = h.orchestrator.run_cycle(&settings).await;

        assert_eq!(report.feeds, 1);
        assert_eq!(report.fresh, 1);
        assert_eq!(report.events_created, 1);
        assert_eq!(report.events_skipped, 1);
        assert_eq!(report.events_failed, 0);

        let records = h.destination.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Team Sync");
        assert!(records[0].body.contains(r#"start="2024-06-01T10:00:00Z""#));
        assert!(records[0].body.contains("ics_uid: abc-123"));
        assert_eq!(records[0].custom_field(ICS_UID_FIELD), Some("abc-123"));
        assert_eq!(records[0].custom_field(ICS_SOURCE_FIELD), Some("team"));
    }

    #[tokio::test]
    async fn not_modified_feed_is_not_parsed() {
        let server = MockServer::start().await;
        serve_with_etag(&server).await;
        let h = harness();
        let settings = SyncSettings::default().with_feeds(feeds_json(&server));

        h.orchestrator.run_cycle(&settings).await;
        let writes = h.destination.write_count();

        h.clock.advance(Duration::minutes(5));
        let report = h.orchestrator.run_cycle(&settings).await;

        assert_eq!(report.not_modified, 1);
        assert_eq!(report.events_created + report.events_unchanged, 0);
        assert_eq!(h.destination.write_count(), writes);

        let state = h.state.get("team");
        assert_eq!(state.etag.as_deref(), Some("\"v1\""));
        assert_eq!(state.status, Some(FeedStatus::NotModified));
        assert_eq!(state.fetched_at, Some(start() + Duration::minutes(5)));
    }

    #[tokio::test]
    async fn unchanged_fresh_content_costs_no_writes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TEAM_SYNC_ICS))
            .mount(&server)
            .await;
        let h = harness();
        let settings = SyncSettings::default()
            .with_default_tags("calendar")
            .with_feeds(feeds_json(&server));

        h.orchestrator.run_cycle(&settings).await;
        let writes = h.destination.write_count();

        let report = h.orchestrator.run_cycle(&settings).await;
        assert_eq!(report.events_unchanged, 1);
        assert_eq!(h.destination.write_count(), writes);
        assert_eq!(h.destination.records().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_feed_does_not_stop_others() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken.ics"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/team.ics"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TEAM_SYNC_ICS))
            .mount(&server)
            .await;

        let h = harness();
        let broken_url = format!("{}/broken.ics", server.uri());
        let settings = SyncSettings::default().with_feeds(format!(
            r#"[{{"url": "{broken_url}"}}, {{"url": ""}}, {{"url": "{}/team.ics"}}]"#,
            server.uri()
        ));

        let report = h.orchestrator.run_cycle(&settings).await;

        assert_eq!(report.feeds, 2);
        assert_eq!(report.fetch_failed, 1);
        assert_eq!(report.events_created, 1);
        let broken = h.state.get(&derive_feed_key(None, &broken_url));
        assert_eq!(broken.status, Some(FeedStatus::Http(404)));
    }

    #[tokio::test]
    async fn rejected_event_is_counted_and_cycle_continues() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TEAM_SYNC_ICS))
            .mount(&server)
            .await;
        let h = harness_with(MemoryDestination::new().with_min_title_length(15));
        let settings = SyncSettings::default().with_feeds(feeds_json(&server));

        let report = h.orchestrator.run_cycle(&settings).await;

        assert_eq!(report.events_failed, 1);
        assert_eq!(report.events_skipped, 1);
        assert!(h.destination.records().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_feed_list_is_a_no_op() {
        let h = harness();
        let settings = SyncSettings::default().with_feeds("[{not json");

        let report = h.orchestrator.run_cycle(&settings).await;

        assert!(!report.is_skipped());
        assert_eq!(report.feeds, 0);
        assert_eq!(h.destination.write_count(), 0);
    }

    #[tokio::test]
    async fn disabled_sync_does_nothing() {
        let h = harness();
        let settings = SyncSettings::default()
            .with_enabled(false)
            .with_fetch_interval(10);

        let report = h.orchestrator.run_cycle(&settings).await;

        assert_eq!(report, CycleReport::skipped(SkipReason::Disabled));
        assert!(h.state.last_run().is_none());
    }

    #[tokio::test]
    async fn interval_gate_skips_until_elapsed() {
        let h = harness();
        let settings = SyncSettings::default().with_fetch_interval(10);

        let first = h.orchestrator.run_cycle(&settings).await;
        assert!(!first.is_skipped());
        assert_eq!(h.state.last_run(), Some(start()));

        h.clock.advance(Duration::minutes(9) + Duration::seconds(59));
        let second = h.orchestrator.run_cycle(&settings).await;
        assert_eq!(second.skipped, Some(SkipReason::IntervalNotElapsed));
        assert_eq!(h.state.last_run(), Some(start()));

        h.clock.advance(Duration::seconds(1));
        let third = h.orchestrator.run_cycle(&settings).await;
        assert!(!third.is_skipped());
        assert_eq!(h.state.last_run(), Some(start() + Duration::minutes(10)));
    }

    #[tokio::test]
    async fn huge_interval_keeps_the_gate_closed() {
        let h = harness();
        let settings = SyncSettings::default().with_fetch_interval(u64::MAX);

        assert!(!h.orchestrator.run_cycle(&settings).await.is_skipped());

        h.clock.advance(Duration::days(365));
        let second = h.orchestrator.run_cycle(&settings).await;
        assert_eq!(second.skipped, Some(SkipReason::IntervalNotElapsed));
        assert_eq!(h.state.last_run(), Some(start()));
    }

    #[test]
    fn mistyped_feed_entry_does_not_drop_the_others() {
        let settings = SyncSettings::default().with_feeds(
            r#"[
                {"url": "https://a.example/a.ics"},
                {"url": "https://b.example/b.ics", "static_tags": "Meetup"},
                {"url": 123},
                {"key": "nourl"}
            ]"#,
        );

        let feeds = resolve_feeds(&settings);
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].url, "https://a.example/a.ics");
    }

    #[tokio::test]
    async fn zero_interval_never_records_last_run() {
        let h = harness();
        h.orchestrator.run_cycle(&SyncSettings::default()).await;
        assert!(h.state.last_run().is_none());
    }

    #[test]
    fn report_display() {
        let report = CycleReport {
            feeds: 2,
            fresh: 1,
            not_modified: 1,
            events_created: 3,
            ..Default::default()
        };
        assert_eq!(
            report.to_string(),
            "feeds: 2 (1 fresh, 1 not modified, 0 failed); events: 3 created, 0 updated, 0 unchanged, 0 skipped, 0 failed"
        );
        assert_eq!(
            CycleReport::skipped(SkipReason::Disabled).to_string(),
            "skipped: sync is disabled"
        );
    }
}
