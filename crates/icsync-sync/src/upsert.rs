//! Create-or-update of destination records, keyed by event UID.

use std::sync::Arc;

use icsync_core::{Event, FeedConfig, merge_tags};
use tracing::{debug, info};

use crate::destination::{CustomFields, Destination, ICS_UID_FIELD, NewRecord, RecordId};
use crate::error::SyncResult;
use crate::render::EventRenderer;
use crate::settings::SyncSettings;

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The event has no usable UID.
    Skipped,
    /// A new record was created.
    Created(RecordId),
    /// An existing record was rewritten.
    Updated {
        id: RecordId,
        body_changed: bool,
        tags_changed: bool,
    },
    /// An existing record already matched.
    Unchanged(RecordId),
}

/// Writes events into a [`Destination`], one record per UID.
///
/// Bodies follow the latest feed content. Tags are only ever added.
pub struct UpsertEngine {
    destination: Arc<dyn Destination>,
    renderer: EventRenderer,
    settings: SyncSettings,
}

impl UpsertEngine {
    /// Creates an engine writing to `destination` with the given settings.
    pub fn new(destination: Arc<dyn Destination>, settings: &SyncSettings) -> Self {
        Self {
            destination,
            renderer: EventRenderer::new(settings.site_timezone()),
            settings: settings.clone(),
        }
    }

    /// Creates or updates the record for `event`.
    pub async fn upsert(&self, event: &Event, feed: &FeedConfig) -> SyncResult<UpsertOutcome> {
        let uid = event.uid.trim();
        if uid.is_empty() {
            debug!(feed = %feed.key, "Skipping event without UID");
            return Ok(UpsertOutcome::Skipped);
        }

        let existing = self
            .destination
            .find_by_custom_field(ICS_UID_FIELD, uid)
            .await?;
        let tags = self.settings.tags_for(feed);
        let rendered = self.renderer.render(event);

        let Some(record) = existing else {
            let created = self
                .destination
                .create(NewRecord {
                    title: rendered.title,
                    body: rendered.body,
                    category_id: feed.category_id,
                    tags,
                    actor: self.settings.actor.clone(),
                })
                .await?;
            self.destination
                .attach_custom_fields(
                    created.id,
                    CustomFields {
                        uid: uid.to_string(),
                        source: feed.key.clone(),
                    },
                )
                .await?;

            info!(feed = %feed.key, uid = %uid, id = %created.id, "Created record");
            return Ok(UpsertOutcome::Created(created.id));
        };

        let body_changed = record.body.trim() != rendered.body.trim();
        if body_changed {
            self.destination
                .update_body(record.id, rendered.body)
                .await?;
        }

        let mut tags_changed = false;
        if !tags.is_empty() {
            let merged = merge_tags(&record.tags, &tags);
            if merged != record.tags {
                self.destination.set_tags(record.id, merged).await?;
                tags_changed = true;
            }
        }

        if body_changed || tags_changed {
            info!(
                feed = %feed.key,
                uid = %uid,
                id = %record.id,
                body_changed,
                tags_changed,
                "Updated record"
            );
            Ok(UpsertOutcome::Updated {
                id: record.id,
                body_changed,
                tags_changed,
            })
        } else {
            debug!(feed = %feed.key, uid = %uid, id = %record.id, "Record unchanged");
            Ok(UpsertOutcome::Unchanged(record.id))
        }
    }
}
