//! The destination that synced events are written to.
//!
//! [`Destination`] is the seam to the external record store (a forum, a
//! CMS, a JSON file). Every record carries an `ics_uid` custom field that
//! links it back to its calendar event.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::DestinationError;
use crate::render::parse_uid_marker;

/// Custom field linking a record to its event UID.
pub const ICS_UID_FIELD: &str = "ics_uid";

/// Custom field recording the feed key a record came from.
pub const ICS_SOURCE_FIELD: &str = "ics_source";

/// A boxed future for async trait methods.
///
/// Boxed futures keep [`Destination`] usable as `dyn Destination`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type for destination operations.
pub type DestinationResult<T> = Result<T, DestinationError>;

/// Identifier of a destination record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A record as stored by a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationRecord {
    pub id: RecordId,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
    #[serde(default)]
    pub created_by: String,
}

impl DestinationRecord {
    /// Returns the value of a custom field.
    pub fn custom_field(&self, name: &str) -> Option<&str> {
        self.custom_fields.get(name).map(String::as_str)
    }
}

/// The data needed to create a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub title: String,
    pub body: String,
    pub category_id: Option<u64>,
    pub tags: Vec<String>,
    /// Identity the record is created as.
    pub actor: String,
}

/// The link fields attached to a record after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomFields {
    /// The event UID, stored as `ics_uid`.
    pub uid: String,
    /// The feed key, stored as `ics_source`.
    pub source: String,
}

/// A store of records that events are synced into.
pub trait Destination: Send + Sync {
    /// Finds the record whose custom field `name` equals `value`.
    fn find_by_custom_field<'a>(
        &'a self,
        name: &'a str,
        value: &'a str,
    ) -> BoxFuture<'a, DestinationResult<Option<DestinationRecord>>>;

    /// Creates a record. Rejected records return [`DestinationError::Validation`].
    fn create(&self, record: NewRecord) -> BoxFuture<'_, DestinationResult<DestinationRecord>>;

    /// Replaces the body of a record.
    fn update_body(&self, id: RecordId, body: String) -> BoxFuture<'_, DestinationResult<()>>;

    /// Replaces the tag set of a record.
    fn set_tags(&self, id: RecordId, tags: Vec<String>) -> BoxFuture<'_, DestinationResult<()>>;

    /// Attaches the `ics_uid` and `ics_source` fields to a record.
    fn attach_custom_fields(
        &self,
        id: RecordId,
        fields: CustomFields,
    ) -> BoxFuture<'_, DestinationResult<()>>;
}

/// A set of records with the semantics every bundled destination shares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    records: BTreeMap<RecordId, DestinationRecord>,
}

impl RecordSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns a record by id.
    pub fn get(&self, id: RecordId) -> Option<&DestinationRecord> {
        self.records.get(&id)
    }

    /// Iterates over records in id order.
    pub fn iter(&self) -> impl Iterator<Item = &DestinationRecord> {
        self.records.values()
    }

    /// Finds a record by custom field.
    ///
    /// For `ics_uid`, a record that never had the field attached is also
    /// found through the UID marker in its body.
    pub fn find_by_custom_field(&self, name: &str, value: &str) -> Option<&DestinationRecord> {
        if let Some(record) = self
            .records
            .values()
            .find(|r| r.custom_field(name) == Some(value))
        {
            return Some(record);
        }

        if name != ICS_UID_FIELD {
            return None;
        }
        self.records.values().find(|r| {
            r.custom_field(ICS_UID_FIELD).is_none()
                && parse_uid_marker(&r.body).as_deref() == Some(value)
        })
    }

    /// Validates and inserts a new record.
    pub fn create(
        &mut self,
        record: NewRecord,
        min_title_length: usize,
    ) -> DestinationResult<DestinationRecord> {
        let mut errors = Vec::new();
        if record.title.trim().chars().count() < min_title_length.max(1) {
            errors.push(format!(
                "Title is too short (minimum is {} characters)",
                min_title_length.max(1)
            ));
        }
        if record.body.trim().is_empty() {
            errors.push("Body can't be blank".to_string());
        }
        if !errors.is_empty() {
            return Err(DestinationError::Validation(errors));
        }

        self.next_id += 1;
        let created = DestinationRecord {
            id: RecordId(self.next_id),
            title: record.title.trim().to_string(),
            body: record.body,
            category_id: record.category_id,
            tags: record.tags,
            custom_fields: BTreeMap::new(),
            created_by: record.actor,
        };
        self.records.insert(created.id, created.clone());
        Ok(created)
    }

    /// Replaces the body of a record.
    pub fn update_body(&mut self, id: RecordId, body: String) -> DestinationResult<()> {
        self.get_mut(id)?.body = body;
        Ok(())
    }

    /// Replaces the tags of a record.
    pub fn set_tags(&mut self, id: RecordId, tags: Vec<String>) -> DestinationResult<()> {
        self.get_mut(id)?.tags = tags;
        Ok(())
    }

    /// Attaches the link fields to a record.
    pub fn attach_custom_fields(&mut self, id: RecordId, fields: CustomFields) -> DestinationResult<()> {
        let record = self.get_mut(id)?;
        record
            .custom_fields
            .insert(ICS_UID_FIELD.to_string(), fields.uid);
        record
            .custom_fields
            .insert(ICS_SOURCE_FIELD.to_string(), fields.source);
        Ok(())
    }

    fn get_mut(&mut self, id: RecordId) -> DestinationResult<&mut DestinationRecord> {
        self.records
            .get_mut(&id)
            .ok_or_else(|| DestinationError::not_found(id))
    }
}

/// In-memory destination.
///
/// Counts every write so callers can check that unchanged events cost
/// nothing.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    records: RwLock<RecordSet>,
    min_title_length: usize,
    writes: AtomicUsize,
}

impl MemoryDestination {
    /// Creates an empty destination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: reject titles shorter than `length` characters.
    pub fn with_min_title_length(mut self, length: usize) -> Self {
        self.min_title_length = length;
        self
    }

    /// Returns a copy of every record.
    pub async fn records(&self) -> Vec<DestinationRecord> {
        self.records.read().await.iter().cloned().collect()
    }

    /// Returns the number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn count_write<T>(&self, result: DestinationResult<T>) -> DestinationResult<T> {
        if result.is_ok() {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}

impl Destination for MemoryDestination {
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
        Box::pin(async move {
            let result = self
                .records
                .write()
                .await
                .create(record, self.min_title_length);
            self.count_write(result)
        })
    }

    fn update_body(&self, id: RecordId, body: String) -> BoxFuture<'_, DestinationResult<()>> {
        Box::pin(async move {
            let result = self.records.write().await.update_body(id, body);
            self.count_write(result)
        })
    }

    fn set_tags(&self, id: RecordId, tags: Vec<String>) -> BoxFuture<'_, DestinationResult<()>> {
        Box::pin(async move {
            let result = self.records.write().await.set_tags(id, tags);
            self.count_write(result)
        })
    }

    fn attach_custom_fields(
        &self,
        id: RecordId,
        fields: CustomFields,
    ) -> BoxFuture<'_, DestinationResult<()>> {
        Box::pin(async move {
            let result = self.records.write().await.attach_custom_fields(id, fields);
            self.count_write(result)
        })
    }
}
