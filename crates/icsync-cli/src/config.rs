//! Application configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/icsync/config.toml` by default:
//!
//! ```toml
//! [sync]
//! default_tags = "calendar, events"
//! feeds = '[{"url": "https://example.com/cal.ics", "static_tags": ["Meetup"]}]'
//!
//! [storage]
//! state_path = "/var/lib/icsync/state.json"
//!
//! [daemon]
//! interval_secs = 300
//! ```

use std::path::{Path, PathBuf};

use icsync_sync::SyncSettings;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

/// Configuration for the icsync CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Sync settings, re-read at the start of every daemon cycle.
    pub sync: SyncSettings,

    /// Where state and records are stored.
    pub storage: StorageSettings,

    /// Daemon settings.
    pub daemon: DaemonSettings,
}

/// File locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Fetch-state file. Defaults to `<data_dir>/icsync/state.json`.
    pub state_path: Option<PathBuf>,

    /// Record store file. Defaults to `<data_dir>/icsync/records.json`.
    pub records_path: Option<PathBuf>,
}

impl StorageSettings {
    /// Returns the fetch-state file path.
    pub fn state_path(&self) -> PathBuf {
        self.state_path
            .clone()
            .unwrap_or_else(|| AppConfig::default_data_dir().join("state.json"))
    }

    /// Returns the record store file path.
    pub fn records_path(&self) -> PathBuf {
        self.records_path
            .clone()
            .unwrap_or_else(|| AppConfig::default_data_dir().join("records.json"))
    }
}

/// Daemon settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// Seconds between cycles.
    pub interval_secs: u64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

impl AppConfig {
    /// Loads configuration from `path`, or from the default path when none is
    /// given.
    ///
    /// An explicit path must exist. A missing default file means defaults.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| CliError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("icsync")
    }

    /// Returns the default data directory path.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("icsync")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.sync.enabled);
        assert_eq!(config.daemon.interval_secs, 300);
        assert!(config.storage.state_path().ends_with("icsync/state.json"));
        assert!(config.storage.records_path().ends_with("icsync/records.json"));
    }

    #[test]
    fn full_config() {
        let toml_content = r#"
[sync]
enabled = true
fetch_interval_mins = 15
default_tags = "calendar, events"
default_category = 5
max_tag_length = 12
namespace = "club"
display_timezone = "Europe/Paris"
actor = "calendar-bot"
feeds = '[{"url": "https://example.com/cal.ics", "category_id": "7"}]'

[storage]
state_path = "/tmp/icsync/state.json"
records_path = "/tmp/icsync/records.json"

[daemon]
interval_secs = 60
"#;
        let config = AppConfig::parse(toml_content).unwrap();

        assert_eq!(config.sync.fetch_interval_mins, 15);
        assert_eq!(config.sync.default_category, Some(5));
        assert_eq!(config.sync.max_tag_length, 12);
        assert_eq!(config.sync.site_timezone(), Some("Europe/Paris"));
        assert_eq!(config.sync.actor, "calendar-bot");
        assert!(config.sync.feeds.contains("example.com"));
        assert_eq!(
            config.storage.state_path(),
            PathBuf::from("/tmp/icsync/state.json")
        );
        assert_eq!(config.daemon.interval_secs, 60);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sync]\nenabled = false\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert!(!config.sync.enabled);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(err.to_string().starts_with("configuration error: failed to read"));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sync\n").unwrap();

        assert!(matches!(AppConfig::load_from(&path), Err(CliError::Config(_))));
    }
}
