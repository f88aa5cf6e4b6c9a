//! Error types and handling
//!
//! Error types shared by the recorder, the session index and the index reader.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Recorder-wide error type
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cannot create session index {path:?}: {source}")]
    SessionIndex {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot open track file {path:?}: {source}")]
    TrackOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Track file already registered in this session: {0}")]
    DuplicateTrack(String),

    #[error("Invalid track file extension: {0:?}")]
    InvalidExtension(String),

    #[error("Unknown track id: {0}")]
    UnknownTrack(u32),

    #[error("Recorder is stopped")]
    Stopped,

    #[error("Malformed index line {line}: {reason}")]
    MalformedIndex { line: usize, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RecorderError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            RecorderError::Io(_) => "IO_ERROR",
            RecorderError::Serialization(_) => "SERIALIZATION_ERROR",
            RecorderError::SessionIndex { .. } => "SESSION_INDEX_ERROR",
            RecorderError::TrackOpen { .. } => "TRACK_OPEN_ERROR",
            RecorderError::DuplicateTrack(_) => "DUPLICATE_TRACK",
            RecorderError::InvalidExtension(_) => "INVALID_EXTENSION",
            RecorderError::UnknownTrack(_) => "UNKNOWN_TRACK",
            RecorderError::Stopped => "STOPPED",
            RecorderError::MalformedIndex { .. } => "MALFORMED_INDEX",
            RecorderError::Config(_) => "CONFIG_ERROR",
        }
    }
}

/// Result type alias using RecorderError
pub type RecorderResult<T> = Result<T, RecorderError>;

/// Classification of an I/O failure hit while draining a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteFailureKind {
    /// No space left on the device
    DiskFull,
    /// Permission denied or read-only filesystem
    PermissionDenied,
    /// Any other error reported by the operating system
    Device,
    /// Errors without an OS error code (short writes, invalid data)
    Other,
}

impl WriteFailureKind {
    /// Classify an I/O error
    pub fn classify(error: &io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::StorageFull => WriteFailureKind::DiskFull,
            io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem => {
                WriteFailureKind::PermissionDenied
            }
            _ if error.raw_os_error().is_some() => WriteFailureKind::Device,
            _ => WriteFailureKind::Other,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            WriteFailureKind::DiskFull => "DISK_FULL",
            WriteFailureKind::PermissionDenied => "PERMISSION_DENIED",
            WriteFailureKind::Device => "DEVICE_ERROR",
            WriteFailureKind::Other => "WRITE_ERROR",
        }
    }
}

/// Step of the drain sequence that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteStage {
    /// Querying the track file position
    Position,
    /// Writing the sample payload to the track file
    Payload,
    /// Appending the sample record to the session index
    Index,
    /// Flushing and syncing the session index
    Sync,
    /// Appending a `new_track` record to the session index
    NewTrack,
}

impl std::fmt::Display for WriteStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteStage::Position => write!(f, "position"),
            WriteStage::Payload => write!(f, "payload"),
            WriteStage::Index => write!(f, "index"),
            WriteStage::Sync => write!(f, "sync"),
            WriteStage::NewTrack => write!(f, "new_track"),
        }
    }
}

/// A failed drain step
///
/// The entry it belonged to has been dropped, except for a `Sync` failure:
/// the record stays buffered and lands with the next successful sync.
#[derive(Error, Debug)]
#[error("{stage} write failed for track {track_id} ({}): {source}", .kind.code())]
pub struct WriteFailure {
    pub track_id: u32,
    pub stage: WriteStage,
    pub kind: WriteFailureKind,
    #[source]
    pub source: io::Error,
}

impl WriteFailure {
    pub fn new(track_id: u32, stage: WriteStage, source: io::Error) -> Self {
        Self {
            track_id,
            stage,
            kind: WriteFailureKind::classify(&source),
            source,
        }
    }

    pub fn is_disk_full(&self) -> bool {
        self.kind == WriteFailureKind::DiskFull
    }
}
