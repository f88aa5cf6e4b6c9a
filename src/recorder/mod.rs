//! Recording system module
//!
//! This module implements the multi-track recorder:
//! - Recorder to register tracks and queue samples from capture threads
//! - A drain thread writing payloads to per-track files
//! - The CSV session index correlating every sample with its track file

pub mod config;
pub mod coordinator;
mod drain;
pub mod index;
pub mod session;
pub mod state;
pub mod status;
pub mod track;

pub use config::RecorderConfig;
pub use coordinator::{Recorder, RecorderEvent};
pub use drain::SyncPolicy;
pub use index::{read_index, read_sample, IndexRecord, IndexedTrack, SessionIndexContents};
pub use session::{next_session_id, IndexSink, SessionIndex, SessionInfo};
pub use state::{RecorderState, RecorderStats};
pub use status::{DiskStatus, NullStatus, StatusSink};
pub use track::{Track, TrackKind, TrackSpec};
