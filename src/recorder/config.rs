//! Recorder configuration

use crate::utils::error::{RecorderError, RecorderResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default storage directory on the flight controller
pub const DEFAULT_STORAGE_DIR: &str = "/var/VIDEO";

/// Configuration for a recorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    /// Directory holding session indexes and track files
    pub storage_dir: PathBuf,

    /// The index is synced after the first sample and then every
    /// `sync_interval` samples
    pub sync_interval: u32,

    /// Longest time the idle drain loop sleeps before re-checking the queue
    pub idle_wait_ms: u64,

    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            sync_interval: 10,
            // 5 ms keeps up with 200 samples per second
            idle_wait_ms: 5,
            event_capacity: 256,
        }
    }
}

impl RecorderConfig {
    /// Create a configuration writing to `storage_dir`
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_sync_interval(mut self, sync_interval: u32) -> Self {
        self.sync_interval = sync_interval;
        self
    }

    pub fn with_idle_wait(mut self, idle_wait: Duration) -> Self {
        self.idle_wait_ms = idle_wait.as_millis() as u64;
        self
    }

    pub fn with_event_capacity(mut self, event_capacity: usize) -> Self {
        self.event_capacity = event_capacity;
        self
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }

    /// Check value ranges
    pub fn validate(&self) -> RecorderResult<()> {
        if self.storage_dir.as_os_str().is_empty() {
            return Err(RecorderError::Config("storageDir must not be empty".into()));
        }
        if self.sync_interval == 0 {
            return Err(RecorderError::Config("syncInterval must be at least 1".into()));
        }
        if self.idle_wait_ms == 0 {
            return Err(RecorderError::Config("idleWaitMs must be at least 1".into()));
        }
        if self.event_capacity == 0 {
            return Err(RecorderError::Config("eventCapacity must be at least 1".into()));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file
    ///
    /// Missing fields take their default values.
    pub fn from_json_file(path: &Path) -> RecorderResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RecorderConfig = serde_json::from_str(&content)?;
        config.validate()?;

        tracing::debug!("Loaded recorder config from {:?}", path);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = RecorderConfig::default();
        assert_eq!(config.storage_dir, PathBuf::from("/var/VIDEO"));
        assert_eq!(config.sync_interval, 10);
        assert_eq!(config.idle_wait(), Duration::from_millis(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = RecorderConfig::new("/tmp").with_sync_interval(0);
        assert!(matches!(config.validate(), Err(RecorderError::Config(_))));

        let config = RecorderConfig::new("/tmp").with_idle_wait(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recorder.json");
        std::fs::write(&path, r#"{ "storageDir": "/data/video", "syncInterval": 4 }"#).unwrap();

        let config = RecorderConfig::from_json_file(&path).unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("/data/video"));
        assert_eq!(config.sync_interval, 4);
        assert_eq!(config.idle_wait_ms, 5);
    }

    #[test]
    fn test_from_json_file_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recorder.json");

        std::fs::write(&path, r#"{ "syncInterval": 0 }"#).unwrap();
        assert!(matches!(
            RecorderConfig::from_json_file(&path),
            Err(RecorderError::Config(_))
        ));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            RecorderConfig::from_json_file(&path),
            Err(RecorderError::Serialization(_))
        ));
    }
}
