//! Session discovery and the session index writer

use super::index::{IndexRecord, INDEX_HEADER};
use crate::utils::error::{RecorderError, RecorderResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Marker identifying session index files in the storage directory
pub const SESSION_FILE_MARKER: &str = "record_";

/// Name of the index file for a session
pub fn index_file_name(session_id: u32) -> String {
    format!("{SESSION_FILE_MARKER}{session_id:06}.csv")
}

/// Find the next free session id in `storage_dir`
///
/// Every entry whose name contains the session marker contributes the
/// number following its last `_`. Entries without a leading number after
/// that `_` are ignored. A missing directory counts as empty.
pub fn next_session_id(storage_dir: &Path) -> io::Result<u32> {
    let entries = match fs::read_dir(storage_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut next = 0u32;
    for entry in entries {
        let name = entry?.file_name();
        let Some(id) = parse_session_id(&name.to_string_lossy()) else {
            continue;
        };
        if id >= next {
            next = id.saturating_add(1);
        }
    }

    Ok(next)
}

fn parse_session_id(name: &str) -> Option<u32> {
    if !name.contains(SESSION_FILE_MARKER) {
        return None;
    }

    let suffix = &name[name.rfind('_')? + 1..];
    let digits_end = suffix
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(suffix.len());
    suffix[..digits_end].parse().ok()
}

/// Identity of a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Sequential session id
    pub id: u32,

    /// Directory holding the index and track files
    pub storage_dir: PathBuf,

    /// Path of the session index file
    pub index_path: PathBuf,

    /// When the session was created
    pub started_at: DateTime<Utc>,
}

/// Destination of the session index
pub trait IndexSink: Write + Send {
    /// Flush buffered records and force them to stable storage
    fn sync(&mut self) -> io::Result<()>;
}

impl IndexSink for BufWriter<File> {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.get_ref().sync_all()
    }
}

/// Writer for the per-session index file
pub struct SessionIndex<W: IndexSink = BufWriter<File>> {
    writer: W,
    records: u64,
}

impl SessionIndex {
    /// Create the index file of `session_id` inside `storage_dir`
    ///
    /// The file must not exist yet. The header is flushed before returning so
    /// that an unusable index is detected at startup.
    pub fn create(storage_dir: &Path, session_id: u32) -> RecorderResult<(Self, PathBuf)> {
        let path = storage_dir.join(index_file_name(session_id));
        let to_error = |source| RecorderError::SessionIndex {
            path: path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(to_error)?;

        let mut index = SessionIndex::from_writer(BufWriter::new(file)).map_err(to_error)?;
        index.writer.flush().map_err(to_error)?;

        tracing::debug!("Created session index {:?}", path);
        Ok((index, path))
    }
}

impl<W: IndexSink> SessionIndex<W> {
    /// Wrap a writer and emit the header lines
    pub fn from_writer(mut writer: W) -> io::Result<Self> {
        for line in INDEX_HEADER {
            writeln!(writer, "{line}")?;
        }
        Ok(Self { writer, records: 0 })
    }

    /// Append one record line
    pub fn append(&mut self, record: &IndexRecord) -> io::Result<()> {
        writeln!(self.writer, "{record}")?;
        self.records += 1;
        Ok(())
    }

    /// Flush and force the index to stable storage
    pub fn sync(&mut self) -> io::Result<()> {
        self.writer.sync()
    }

    /// Number of records appended so far
    pub fn records(&self) -> u64 {
        self.records
    }
}
