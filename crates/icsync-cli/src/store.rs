//! JSON-file record store.
//!
//! [`JsonRecordStore`] is the destination the CLI ships with: every record
//! lives in one JSON file, rewritten after each change.

use std::path::{Path, PathBuf};

use icsync_feeds::write_atomically;
use icsync_sync::{
    BoxFuture, CustomFields, Destination, DestinationError, DestinationRecord, DestinationResult,
    NewRecord, RecordId, RecordSet,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{CliError, CliResult};

/// A [`Destination`] backed by a JSON file.
#[derive(Debug)]
pub struct JsonRecordStore {
    path: PathBuf,
    records: RwLock<RecordSet>,
}

impl JsonRecordStore {
    /// Opens the store at `path`. A missing file is an empty store.
    ///
    /// A corrupt file is an error: starting empty would duplicate every
    /// record on the next cycle.
    pub fn open(path: impl Into<PathBuf>) -> CliResult<Self> {
        let path = path.into();
        let records = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                CliError::Config(format!("corrupt record store {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RecordSet::new(),
            Err(e) => return Err(CliError::Io(e)),
        };
        debug!(path = %path.display(), "Opened record store");

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a copy of every record.
    pub async fn records(&self) -> Vec<DestinationRecord> {
        self.records.read().await.iter().cloned().collect()
    }

    /// Applies `change` and persists the result.
    async fn modify<T>(
        &self,
        change: impl FnOnce(&mut RecordSet) -> DestinationResult<T>,
    ) -> DestinationResult<T> {
        let mut records = self.records.write().await;
        let result = change(&mut *records)?;

        let json = serde_json::to_string_pretty(&*records)
            .map_err(|e| DestinationError::storage(format!("failed to serialize records: {e}")))?;
        write_atomically(&self.path, json.as_bytes())
            .map_err(|e| DestinationError::storage(e.to_string()))?;
        Ok(result)
    }
}

impl Destination for JsonRecordStore {
    fn find_by_custom_field<'a>(
        &'a self,
        name: &'a str,
        value: &'a str,
    ) -> BoxFuture<'a, DestinationResult<Option<DestinationRecord>>> {
        Box::pin(async move {
            Ok(self
                .records
                .read()
                .await
                .find_by_custom_field(name, value)
                .cloned())
        })
    }

    fn create(&self, record: NewRecord) -> BoxFuture<'_, DestinationResult<DestinationRecord>> {
        Box::pin(self.modify(move |records| records.create(record, 1)))
    }

    fn update_body(&self, id: RecordId, body: String) -> BoxFuture<'_, DestinationResult<()>> {
        Box::pin(self.modify(move |records| records.update_body(id, body)))
    }

    fn set_tags(&self, id: RecordId, tags: Vec<String>) -> BoxFuture<'_, DestinationResult<()>> {
        Box::pin(self.modify(move |records| records.set_tags(id, tags)))
    }

    fn attach_custom_fields(
        &self,
        id: RecordId,
        fields: CustomFields,
    ) -> BoxFuture<'_, DestinationResult<()>> {
        Box::pin(self.modify(move |records| records.attach_custom_fields(id, fields)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use icsync_sync::{ICS_SOURCE_FIELD, ICS_UID_FIELD};

    fn new_record(title: &str, uid: &str) -> NewRecord {
        NewRecord {
            title: title.to_string(),
            body: format!("[event]\n[/event]\n\n<!-- ics_uid: {uid} -->\n"),
            category_id: None,
            tags: vec!["calendar".to_string()],
            actor: "system".to_string(),
        }
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        let store = JsonRecordStore::open(&path).unwrap();
        let record = store.create(new_record("Standup", "abc")).await.unwrap();
        store
            .attach_custom_fields(
                record.id,
                CustomFields {
                    uid: "abc".to_string(),
                    source: "team".to_string(),
                },
            )
            .await
            .unwrap();

        let reopened = JsonRecordStore::open(&path).unwrap();
        let found = reopened
            .find_by_custom_field(ICS_UID_FIELD, "abc")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.title, "Standup");
        assert_eq!(found.custom_field(ICS_SOURCE_FIELD), Some("team"));
    }

    #[tokio::test]
    async fn finds_unlinked_record_by_marker() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRecordStore::open(dir.path().join("records.json")).unwrap();
        let record = store.create(new_record("Standup", "xyz")).await.unwrap();

        let found = store
            .find_by_custom_field(ICS_UID_FIELD, "xyz")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, record.id);
    }

    #[tokio::test]
    async fn failed_change_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let store = JsonRecordStore::open(&path).unwrap();

        let err = store
            .set_tags(RecordId(7), vec!["x".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err, DestinationError::not_found(7));
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            JsonRecordStore::open(&path),
            Err(CliError::Config(_))
        ));
    }
}
