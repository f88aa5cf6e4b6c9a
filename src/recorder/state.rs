//! Recorder state management
//!
//! Defines the drain loop state machine and the running statistics.

use serde::{Deserialize, Serialize};

/// Current state of the drain loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// Waiting for queued entries
    Idle,
    /// Persisting an entry
    Draining,
    /// Holding queued entries until resumed
    Paused,
    /// Drain loop has exited
    Stopped,
}

impl Default for RecorderState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Counters maintained by the drain loop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderStats {
    /// Session this recorder writes
    pub session_id: u32,

    /// Samples whose payload and index record were written
    pub samples_written: u64,

    /// Payload bytes written to track files
    pub bytes_written: u64,

    /// Failed drain steps, including index syncs that are retried later
    pub write_failures: u64,

    /// Failures caused by a full disk
    pub disk_full_events: u64,

    /// Cadence syncs of the session index
    pub index_syncs: u64,
}

impl RecorderStats {
    pub fn new(session_id: u32) -> Self {
        Self {
            session_id,
            ..Self::default()
        }
    }
}
