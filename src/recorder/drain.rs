//! Drain step
//!
//! Persists queued entries one at a time: payload to the track file, record to
//! the session index, periodic index sync. Runs on the drain thread only and
//! never holds the queue lock.

use super::coordinator::RecorderEvent;
use super::index::IndexRecord;
use super::session::{IndexSink, SessionIndex};
use super::state::RecorderStats;
use super::status::StatusSink;
use super::track::{PendingSample, Track};
use crate::utils::error::{WriteFailure, WriteFailureKind, WriteStage};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, BufWriter, Seek, Write};
use std::sync::Arc;
use tokio::sync::broadcast;

/// An entry of the pending queue
#[derive(Debug)]
pub(crate) enum PendingEntry {
    /// Emit the `new_track` record of a freshly registered track
    NewTrack(Arc<Track>),
    /// Persist a sample
    Sample(PendingSample),
}

/// Durability cadence
///
/// A sync is due when the counter is zero, so the first sample is synced and
/// then every `interval`-th one. The counter only advances on fully written
/// samples.
#[derive(Debug, Clone)]
pub struct SyncPolicy {
    interval: u32,
    counter: u32,
}

impl SyncPolicy {
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            counter: 0,
        }
    }

    pub fn is_due(&self) -> bool {
        self.counter == 0
    }

    pub fn advance(&mut self) {
        self.counter = (self.counter + 1) % self.interval;
    }
}

pub(crate) struct SampleWriter<W: IndexSink = BufWriter<File>> {
    index: SessionIndex<W>,
    policy: SyncPolicy,
    status: Arc<dyn StatusSink>,
    stats: Arc<Mutex<RecorderStats>>,
    events: broadcast::Sender<RecorderEvent>,
}

impl<W: IndexSink> SampleWriter<W> {
    pub fn new(
        index: SessionIndex<W>,
        policy: SyncPolicy,
        status: Arc<dyn StatusSink>,
        stats: Arc<Mutex<RecorderStats>>,
        events: broadcast::Sender<RecorderEvent>,
    ) -> Self {
        Self {
            index,
            policy,
            status,
            stats,
            events,
        }
    }

    /// Persist one entry, reporting a failure instead of returning it
    pub fn persist(&mut self, entry: PendingEntry) {
        let result = match entry {
            PendingEntry::NewTrack(track) => self.write_new_track(&track),
            PendingEntry::Sample(sample) => self.write_sample(sample),
        };

        if let Err(failure) = result {
            self.report(failure);
        }
    }

    fn write_new_track(&mut self, track: &Track) -> Result<(), WriteFailure> {
        let record = IndexRecord::NewTrack {
            track_id: track.id(),
            kind: track.kind(),
            file_name: track.file_name().to_string(),
        };
        self.index
            .append(&record)
            .map_err(|e| WriteFailure::new(track.id(), WriteStage::NewTrack, e))
    }

    fn write_sample(&mut self, sample: PendingSample) -> Result<(), WriteFailure> {
        let track_id = sample.track.id();
        let fail = |stage: WriteStage| move |e: io::Error| WriteFailure::new(track_id, stage, e);

        let mut file = sample.track.file();
        let offset = file.stream_position().map_err(fail(WriteStage::Position))?;
        file.write_all(&sample.buf).map_err(fail(WriteStage::Payload))?;

        let length = sample.buf.len() as u64;
        self.index
            .append(&IndexRecord::Sample {
                track_id,
                record_time_us: sample.record_time_us,
                offset,
                length,
            })
            .map_err(fail(WriteStage::Index))?;

        // The record is buffered from here on. A failed sync keeps it and the
        // policy stays due, so the next sample retries the sync.
        let due = self.policy.is_due();
        let sync_result = if due { self.index.sync() } else { Ok(()) };
        let synced = due && sync_result.is_ok();
        if sync_result.is_ok() {
            self.policy.advance();
        }

        let samples_written = {
            let mut stats = self.stats.lock();
            stats.samples_written += 1;
            stats.bytes_written += length;
            if synced {
                stats.index_syncs += 1;
            }
            stats.samples_written
        };

        if synced {
            tracing::debug!("Session index synced after {} samples", samples_written);
            let _ = self.events.send(RecorderEvent::IndexSynced { samples_written });
        }
        sync_result.map_err(fail(WriteStage::Sync))
    }

    fn report(&self, failure: WriteFailure) {
        if failure.stage == WriteStage::Sync {
            tracing::warn!("Index sync failed, record kept for the next sync: {}", failure);
        } else {
            tracing::warn!("Dropped queued entry: {}", failure);
        }

        {
            let mut stats = self.stats.lock();
            stats.write_failures += 1;
            if failure.is_disk_full() {
                stats.disk_full_events += 1;
            }
        }

        if failure.is_disk_full() {
            self.status.mark_disk_full();
            let _ = self.events.send(RecorderEvent::DiskFull);
        }
        self.status.report_write_failure(&failure);

        let _ = self.events.send(RecorderEvent::WriteFailed {
            track_id: failure.track_id,
            stage: failure.stage,
            kind: failure.kind,
        });
    }

    /// Final sync of the index and every track file
    ///
    /// Every file is attempted; the first error is returned. Track handles
    /// that are not regular files (devices, pipes) are skipped.
    pub fn finish(&mut self, tracks: &[Arc<Track>]) -> io::Result<()> {
        let mut result = self.index.sync();

        for track in tracks {
            let file = track.file();
            let synced = match file.metadata() {
                Ok(meta) if !meta.is_file() => continue,
                Ok(_) => file.sync_all(),
                Err(e) => Err(e),
            };
            if let Err(e) = synced {
                tracing::error!("Failed to sync track file {}: {}", track.file_name(), e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        if let Err(e) = &result {
            if WriteFailureKind::classify(e) == WriteFailureKind::DiskFull {
                self.stats.lock().disk_full_events += 1;
                self.status.mark_disk_full();
                let _ = self.events.send(RecorderEvent::DiskFull);
            }
        }
        result
    }
}
