//! Session index records
//!
//! The session index is a line-oriented CSV log. Two comment lines document
//! the record shapes, followed by `new_track` records and per-sample records
//! in emission order:
//!
//! ```text
//! # new_track,track_id,type(video/audio),filename
//! # track_id,record_time,pos_in_file,frame_size
//! new_track,0,video,video_1920x1080_30fps_000005.h264
//! 0,1000,0,4096
//! ```

use super::track::TrackKind;
use crate::utils::error::{RecorderError, RecorderResult};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Header lines written at the top of every session index
pub const INDEX_HEADER: [&str; 2] = [
    "# new_track,track_id,type(video/audio),filename",
    "# track_id,record_time,pos_in_file,frame_size",
];

/// One line of the session index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexRecord {
    /// A track was registered
    NewTrack {
        track_id: u32,
        kind: TrackKind,
        file_name: String,
    },
    /// A sample payload was written to a track file
    Sample {
        track_id: u32,
        record_time_us: u64,
        offset: u64,
        length: u64,
    },
}

impl std::fmt::Display for IndexRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexRecord::NewTrack {
                track_id,
                kind,
                file_name,
            } => write!(f, "new_track,{track_id},{kind},{file_name}"),
            IndexRecord::Sample {
                track_id,
                record_time_us,
                offset,
                length,
            } => write!(f, "{track_id},{record_time_us},{offset},{length}"),
        }
    }
}

impl IndexRecord {
    /// Parse one index line
    ///
    /// Comment and blank lines yield `None`. `line_no` is only used for error
    /// reporting.
    pub fn parse(line: &str, line_no: usize) -> RecorderResult<Option<Self>> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let malformed = |reason: String| RecorderError::MalformedIndex {
            line: line_no,
            reason,
        };

        if let Some(rest) = line.strip_prefix("new_track,") {
            let mut fields = rest.splitn(3, ',');
            let (Some(id), Some(kind), Some(file_name)) =
                (fields.next(), fields.next(), fields.next())
            else {
                return Err(malformed("expected 4 fields in new_track record".into()));
            };
            if file_name.is_empty() {
                return Err(malformed("empty file name".into()));
            }

            return Ok(Some(IndexRecord::NewTrack {
                track_id: parse_field(id, "track_id").map_err(malformed)?,
                kind: kind.parse::<TrackKind>().map_err(malformed)?,
                file_name: file_name.to_string(),
            }));
        }

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 4 {
            return Err(malformed(format!(
                "expected 4 fields in sample record, found {}",
                fields.len()
            )));
        }

        Ok(Some(IndexRecord::Sample {
            track_id: parse_field(fields[0], "track_id").map_err(malformed)?,
            record_time_us: parse_field(fields[1], "record_time").map_err(malformed)?,
            offset: parse_field(fields[2], "pos_in_file").map_err(malformed)?,
            length: parse_field(fields[3], "frame_size").map_err(malformed)?,
        }))
    }
}

fn parse_field<T: std::str::FromStr>(value: &str, name: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("invalid {name} {value:?}"))
}

/// Read and parse a whole session index file
///
/// The index is only synced periodically, so after a crash its last line may
/// be cut short. A final line without a terminating newline is skipped.
pub fn read_index(path: &Path) -> RecorderResult<Vec<IndexRecord>> {
    let content = fs::read_to_string(path)?;

    let complete = match content.rfind('\n') {
        Some(end) => &content[..=end],
        None => "",
    };
    if complete.len() < content.len() {
        tracing::warn!(
            "Skipping torn final line of {:?}: {:?}",
            path,
            &content[complete.len()..]
        );
    }

    let mut records = Vec::new();
    for (i, line) in complete.lines().enumerate() {
        if let Some(record) = IndexRecord::parse(line, i + 1)? {
            records.push(record);
        }
    }

    tracing::debug!("Read {} index records from {:?}", records.len(), path);
    Ok(records)
}

/// Read back the payload a sample record points at
pub fn read_sample(storage_dir: &Path, file_name: &str, record: &IndexRecord) -> RecorderResult<Vec<u8>> {
    let IndexRecord::Sample { offset, length, .. } = record else {
        return Err(RecorderError::MalformedIndex {
            line: 0,
            reason: "not a sample record".into(),
        });
    };

    let mut file = File::open(storage_dir.join(file_name))?;
    let file_len = file.metadata()?.len();
    match offset.checked_add(*length) {
        Some(end) if end <= file_len => {}
        _ => {
            return Err(RecorderError::MalformedIndex {
                line: 0,
                reason: format!(
                    "sample at {offset}+{length} lies outside {file_name} ({file_len} bytes)"
                ),
            })
        }
    }

    file.seek(SeekFrom::Start(*offset))?;
    let mut buf = Vec::new();
    file.take(*length).read_to_end(&mut buf)?;
    if buf.len() as u64 != *length {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    Ok(buf)
}

/// A track as described by the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedTrack {
    pub track_id: u32,
    pub kind: TrackKind,
    pub file_name: String,
    /// Sample records of this track, in index order
    pub samples: Vec<IndexRecord>,
}

/// Parsed index grouped by track
#[derive(Debug, Clone, Default)]
pub struct SessionIndexContents {
    pub tracks: BTreeMap<u32, IndexedTrack>,
    /// Every sample record, in index order
    pub samples: Vec<IndexRecord>,

    /// Sample records whose track has no `new_track` record
    pub orphans: Vec<IndexRecord>,
}

impl SessionIndexContents {
    /// Group records by track
    ///
    /// A sample record for a track without a preceding `new_track` record
    /// goes to `orphans`; the other tracks stay readable.
    pub fn from_records(records: Vec<IndexRecord>) -> Self {
        let mut contents = SessionIndexContents::default();

        for record in records {
            match record {
                IndexRecord::NewTrack {
                    track_id,
                    kind,
                    file_name,
                } => {
                    contents.tracks.insert(
                        track_id,
                        IndexedTrack {
                            track_id,
                            kind,
                            file_name,
                            samples: Vec::new(),
                        },
                    );
                }
                IndexRecord::Sample { track_id, .. } => match contents.tracks.get_mut(&track_id) {
                    Some(track) => {
                        track.samples.push(record.clone());
                        contents.samples.push(record);
                    }
                    None => contents.orphans.push(record),
                },
            }
        }

        if !contents.orphans.is_empty() {
            tracing::warn!(
                "{} sample records reference unregistered tracks",
                contents.orphans.len()
            );
        }
        contents
    }

    /// Load and group a session index file
    pub fn load(path: &Path) -> RecorderResult<Self> {
        Ok(Self::from_records(read_index(path)?))
    }
}
