//! Persistence for per-feed fetch state and the cycle "last run" marker.
//!
//! Two implementations are provided:
//! - [`MemoryStateStore`]: process-local, for tests and embedding
//! - [`JsonStateStore`]: a single JSON file, rewritten atomically on change

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use icsync_core::FeedState;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FeedError, FeedResult};

/// Stores the cached fetch metadata of each feed, keyed by feed key.
pub trait FeedStateStore: Send + Sync {
    /// Returns the recorded state, or an empty state when there is none.
    fn get(&self, key: &str) -> FeedState;

    /// Replaces the recorded state.
    fn set(&self, key: &str, state: FeedState) -> FeedResult<()>;
}

/// Stores the time the last sync cycle started.
pub trait RunMarker: Send + Sync {
    /// Returns the recorded time, if any.
    fn last_run(&self) -> Option<DateTime<Utc>>;

    /// Records a new time.
    fn set_last_run(&self, at: DateTime<Utc>) -> FeedResult<()>;
}

/// The serialized form shared by both stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StateData {
    #[serde(default)]
    feeds: BTreeMap<String, FeedState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_run_at: Option<DateTime<Utc>>,
}

/// In-memory state store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    data: RwLock<StateData>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded feed state.
    pub fn snapshot(&self) -> BTreeMap<String, FeedState> {
        read(&self.data).feeds.clone()
    }
}

impl FeedStateStore for MemoryStateStore {
    fn get(&self, key: &str) -> FeedState {
        read(&self.data).feeds.get(key).cloned().unwrap_or_default()
    }

    fn set(&self, key: &str, state: FeedState) -> FeedResult<()> {
        write(&self.data).feeds.insert(key.to_string(), state);
        Ok(())
    }
}

impl RunMarker for MemoryStateStore {
    fn last_run(&self) -> Option<DateTime<Utc>> {
        read(&self.data).last_run_at
    }

    fn set_last_run(&self, at: DateTime<Utc>) -> FeedResult<()> {
        write(&self.data).last_run_at = Some(at);
        Ok(())
    }
}

/// State store backed by one JSON file.
///
/// The file is loaded once on open and rewritten (temp file + rename) after
/// every change.
#[derive(Debug)]
pub struct JsonStateStore {
    path: PathBuf,
    data: RwLock<StateData>,
}

impl JsonStateStore {
    /// Opens the store at `path`.
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is
    /// logged and treated as empty; it is replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Corrupt state file, starting empty");
                StateData::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StateData::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read state file, starting empty");
                StateData::default()
            }
        };
        debug!(path = %path.display(), feeds = data.feeds.len(), "Opened state store");

        Self {
            path,
            data: RwLock::new(data),
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns every recorded feed state.
    pub fn snapshot(&self) -> BTreeMap<String, FeedState> {
        read(&self.data).feeds.clone()
    }

    fn persist(&self, data: &StateData) -> FeedResult<()> {
        let json = serde_json::to_string_pretty(data).map_err(|e| {
            FeedError::storage("failed to serialize feed state").with_source(e)
        })?;
        write_atomically(&self.path, json.as_bytes())
    }
}

impl FeedStateStore for JsonStateStore {
    fn get(&self, key: &str) -> FeedState {
        read(&self.data).feeds.get(key).cloned().unwrap_or_default()
    }

    fn set(&self, key: &str, state: FeedState) -> FeedResult<()> {
        let mut data = write(&self.data);
        data.feeds.insert(key.to_string(), state);
        self.persist(&data).map_err(|e| e.with_feed(key))
    }
}

impl RunMarker for JsonStateStore {
    fn last_run(&self) -> Option<DateTime<Utc>> {
        read(&self.data).last_run_at
    }

    fn set_last_run(&self, at: DateTime<Utc>) -> FeedResult<()> {
        let mut data = write(&self.data);
        data.last_run_at = Some(at);
        self.persist(&data)
    }
}

/// Writes `contents` to `path` through a sibling temp file and a rename.
pub fn write_atomically(path: &Path, contents: &[u8]) -> FeedResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            FeedError::storage(format!("failed to create {}", parent.display())).with_source(e)
        })?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, contents).map_err(|e| {
        FeedError::storage(format!("failed to write {}", tmp.display())).with_source(e)
    })?;
    std::fs::rename(&tmp, path).map_err(|e| {
        FeedError::storage(format!("failed to replace {}", path.display())).with_source(e)
    })
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use icsync_core::FeedStatus;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, minute, 0).unwrap()
    }

    #[test]
    fn memory_store_defaults_to_empty() {
        let store = MemoryStateStore::new();
        assert!(store.get("missing").is_empty());
        assert!(store.last_run().is_none());
    }

    #[test]
    fn memory_store_replaces_whole_state() {
        let store = MemoryStateStore::new();
        store
            .set("feed", FeedState::fresh(at(0), Some("\"v1\"".into()), None))
            .unwrap();
        store
            .set("feed", FeedState::failed(at(5), FeedStatus::Error, "timeout"))
            .unwrap();

        let state = store.get("feed");
        assert!(state.etag.is_none());
        assert_eq!(state.status, Some(FeedStatus::Error));
        assert_eq!(state.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = JsonStateStore::open(&path);
        store
            .set("feed", FeedState::fresh(at(0), Some("\"v1\"".into()), None))
            .unwrap();
        store.set_last_run(at(1)).unwrap();
        assert!(path.exists());

        let reopened = JsonStateStore::open(&path);
        assert_eq!(reopened.get("feed").etag.as_deref(), Some("\"v1\""));
        assert_eq!(reopened.last_run(), Some(at(1)));
        assert_eq!(reopened.snapshot().len(), 1);
    }

    #[test]
    fn json_store_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonStateStore::open(&path);
        assert!(store.get("feed").is_empty());

        store
            .set("feed", FeedState::failed(at(0), FeedStatus::Http(500), "boom"))
            .unwrap();
        let reopened = JsonStateStore::open(&path);
        assert_eq!(reopened.get("feed").status, Some(FeedStatus::Http(500)));
    }

    #[test]
    fn write_atomically_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_atomically(&path, b"[]").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
        assert!(!dir.path().join("out.json.tmp").exists());
    }
}
