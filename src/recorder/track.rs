//! Tracks and pending samples
//!
//! A track is one media stream of a session, backed by its own payload file.

use crate::utils::error::{RecorderError, RecorderResult};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::Audio => write!(f, "audio"),
        }
    }
}

impl FromStr for TrackKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(TrackKind::Video),
            "audio" => Ok(TrackKind::Audio),
            other => Err(format!("unknown track type {other:?}")),
        }
    }
}

/// Type-specific track parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TrackSpec {
    Video { width: u32, height: u32, fps: u32 },
    Audio { sample_rate: u32, channels: u32 },
}

impl TrackSpec {
    pub fn kind(&self) -> TrackKind {
        match self {
            TrackSpec::Video { .. } => TrackKind::Video,
            TrackSpec::Audio { .. } => TrackKind::Audio,
        }
    }

    /// Build the payload file name for this track in the given session
    ///
    /// The parameters are part of the name, so two tracks of the same session
    /// only collide when they carry identical content descriptions.
    pub fn file_name(&self, session_id: u32, extension: &str) -> RecorderResult<String> {
        validate_extension(extension)?;

        Ok(match self {
            TrackSpec::Video { width, height, fps } => {
                format!("video_{width}x{height}_{fps:02}fps_{session_id:06}.{extension}")
            }
            TrackSpec::Audio {
                sample_rate,
                channels,
            } => format!("audio_{sample_rate}hz_{channels}ch_{session_id:06}.{extension}"),
        })
    }
}

fn validate_extension(extension: &str) -> RecorderResult<()> {
    let invalid = extension.is_empty()
        || extension
            .chars()
            .any(|c| c == '/' || c == '\\' || c == ',' || c.is_control());

    if invalid {
        return Err(RecorderError::InvalidExtension(extension.to_string()));
    }
    Ok(())
}

/// One registered media stream
///
/// The payload file is written only by the drain thread; producers never
/// touch it.
#[derive(Debug)]
pub struct Track {
    id: u32,
    kind: TrackKind,
    file_name: String,
    file: File,
}

impl Track {
    pub(crate) fn new(id: u32, kind: TrackKind, file_name: String, file: File) -> Self {
        Self {
            id,
            kind,
            file_name,
            file,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub(crate) fn file(&self) -> &File {
        &self.file
    }
}

/// Create (or truncate) a track payload file
pub(crate) fn open_track_file(path: &Path) -> RecorderResult<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|source| RecorderError::TrackOpen {
            path: path.to_path_buf(),
            source,
        })
}

/// A sample waiting for the drain thread
#[derive(Debug)]
pub struct PendingSample {
    pub track: Arc<Track>,
    pub record_time_us: u64,
    pub buf: Vec<u8>,
}
