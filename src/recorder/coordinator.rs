//! Recorder
//!
//! Owns the session, the track registry, the pending queue and the drain
//! thread. Producers only ever hold the shared lock for O(1) queue and
//! registry updates; all file I/O happens on the drain thread.

use super::config::RecorderConfig;
use super::drain::{PendingEntry, SampleWriter, SyncPolicy};
use super::session::{next_session_id, SessionIndex, SessionInfo};
use super::state::{RecorderState, RecorderStats};
use super::status::StatusSink;
use super::track::{open_track_file, PendingSample, Track, TrackKind, TrackSpec};
use crate::utils::error::{RecorderError, RecorderResult, WriteFailureKind, WriteStage};
use chrono::Utc;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::broadcast;

/// Events emitted while recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// A track was registered
    TrackAdded {
        track_id: u32,
        kind: TrackKind,
        file_name: String,
    },
    /// The session index was forced to stable storage
    IndexSynced { samples_written: u64 },
    /// A drain step failed. Only a `Sync` failure keeps the entry.
    WriteFailed {
        track_id: u32,
        stage: WriteStage,
        kind: WriteFailureKind,
    },
    /// Storage ran out of space
    DiskFull,
    /// Drain loop paused
    Paused,
    /// Drain loop resumed
    Resumed,
    /// Recorder stopped, every file closed
    Stopped,
}

/// State shared between producers and the drain thread
#[derive(Default)]
struct Registry {
    tracks: Vec<Arc<Track>>,
    /// File names claimed by registered or in-flight tracks
    reserved: HashSet<String>,
    pending: VecDeque<PendingEntry>,
    state: RecorderState,
    paused: bool,
    stopping: bool,
}

struct Shared {
    registry: Mutex<Registry>,
    wake: Condvar,
}

/// Asynchronous multi-track recorder
///
/// `Recorder` is `Send + Sync`; share it behind an `Arc` between capture
/// threads.
pub struct Recorder {
    session: SessionInfo,
    shared: Arc<Shared>,
    stats: Arc<Mutex<RecorderStats>>,
    event_tx: broadcast::Sender<RecorderEvent>,
    drain_thread: Mutex<Option<JoinHandle<io::Result<()>>>>,
}

impl Recorder {
    /// Start a new session in `config.storage_dir`
    ///
    /// Creates the directory if needed, picks the next free session id,
    /// creates the session index and starts the drain thread.
    pub fn new(config: RecorderConfig, status: Arc<dyn StatusSink>) -> RecorderResult<Self> {
        config.validate()?;

        let storage_dir = config.storage_dir.clone();
        std::fs::create_dir_all(&storage_dir).map_err(|source| RecorderError::SessionIndex {
            path: storage_dir.clone(),
            source,
        })?;

        let session_id = next_session_id(&storage_dir)?;
        let (index, index_path) = SessionIndex::create(&storage_dir, session_id)?;

        let session = SessionInfo {
            id: session_id,
            storage_dir,
            index_path,
            started_at: Utc::now(),
        };

        let stats = Arc::new(Mutex::new(RecorderStats::new(session_id)));
        let (event_tx, _) = broadcast::channel(config.event_capacity);
        let shared = Arc::new(Shared {
            registry: Mutex::new(Registry::default()),
            wake: Condvar::new(),
        });

        let writer = SampleWriter::new(
            index,
            SyncPolicy::new(config.sync_interval),
            status,
            stats.clone(),
            event_tx.clone(),
        );

        let handle = {
            let shared = shared.clone();
            let idle_wait = config.idle_wait();
            thread::Builder::new()
                .name("recorder".to_string())
                .spawn(move || drain_loop(shared, writer, idle_wait))?
        };

        tracing::info!(
            "Recording session {} to {:?}",
            session.id,
            session.index_path
        );

        Ok(Self {
            session,
            shared,
            stats,
            event_tx,
            drain_thread: Mutex::new(Some(handle)),
        })
    }

    /// Register a track and open its payload file
    ///
    /// The returned id can be passed to [`Recorder::write_sample`] right away.
    pub fn add_track(&self, spec: TrackSpec, extension: &str) -> RecorderResult<u32> {
        let file_name = spec.file_name(self.session.id, extension)?;

        {
            let mut registry = self.shared.registry.lock();
            if registry.stopping {
                return Err(RecorderError::Stopped);
            }
            if !registry.reserved.insert(file_name.clone()) {
                return Err(RecorderError::DuplicateTrack(file_name));
            }
        }

        let path = self.session.storage_dir.join(&file_name);
        let file = match open_track_file(&path) {
            Ok(file) => file,
            Err(e) => {
                self.shared.registry.lock().reserved.remove(&file_name);
                return Err(e);
            }
        };

        let kind = spec.kind();
        let track_id = {
            let mut registry = self.shared.registry.lock();
            if registry.stopping {
                registry.reserved.remove(&file_name);
                return Err(RecorderError::Stopped);
            }

            let track_id = registry.tracks.len() as u32;
            let track = Arc::new(Track::new(track_id, kind, file_name.clone(), file));
            registry.tracks.push(track.clone());
            registry.pending.push_back(PendingEntry::NewTrack(track));
            track_id
        };
        self.shared.wake.notify_one();

        tracing::debug!("Added {} track {}: {}", kind, track_id, file_name);
        let _ = self.event_tx.send(RecorderEvent::TrackAdded {
            track_id,
            kind,
            file_name,
        });

        Ok(track_id)
    }

    /// Register a video track
    pub fn add_video_track(
        &self,
        width: u32,
        height: u32,
        average_fps: u32,
        extension: &str,
    ) -> RecorderResult<u32> {
        self.add_track(
            TrackSpec::Video {
                width,
                height,
                fps: average_fps,
            },
            extension,
        )
    }

    /// Register an audio track
    pub fn add_audio_track(
        &self,
        channels: u32,
        sample_rate: u32,
        extension: &str,
    ) -> RecorderResult<u32> {
        self.add_track(
            TrackSpec::Audio {
                sample_rate,
                channels,
            },
            extension,
        )
    }

    /// Queue a sample for the given track
    ///
    /// `buf` is copied; the call returns as soon as the copy is queued.
    pub fn write_sample(&self, track_id: u32, record_time_us: u64, buf: &[u8]) -> RecorderResult<()> {
        let buf = buf.to_vec();

        {
            let mut registry = self.shared.registry.lock();
            if registry.stopping {
                return Err(RecorderError::Stopped);
            }

            let track = registry
                .tracks
                .get(track_id as usize)
                .cloned()
                .ok_or(RecorderError::UnknownTrack(track_id))?;

            registry.pending.push_back(PendingEntry::Sample(PendingSample {
                track,
                record_time_us,
                buf,
            }));
        }
        self.shared.wake.notify_one();

        Ok(())
    }

    /// Hold queued entries on the queue until [`Recorder::resume`]
    ///
    /// Producers keep submitting normally while paused.
    pub fn pause(&self) -> RecorderResult<()> {
        {
            let mut registry = self.shared.registry.lock();
            if registry.stopping {
                return Err(RecorderError::Stopped);
            }
            if registry.paused {
                return Ok(());
            }
            registry.paused = true;
        }

        tracing::info!("Pausing recorder");
        let _ = self.event_tx.send(RecorderEvent::Paused);
        Ok(())
    }

    /// Resume draining after [`Recorder::pause`]
    pub fn resume(&self) -> RecorderResult<()> {
        {
            let mut registry = self.shared.registry.lock();
            if registry.stopping {
                return Err(RecorderError::Stopped);
            }
            if !registry.paused {
                return Ok(());
            }
            registry.paused = false;
        }
        self.shared.wake.notify_all();

        tracing::info!("Resuming recorder");
        let _ = self.event_tx.send(RecorderEvent::Resumed);
        Ok(())
    }

    /// Drain every queued entry, sync all files and stop the drain thread
    ///
    /// Later calls return the final statistics without doing anything. A call
    /// racing the first one waits until the drain thread has exited.
    pub fn stop(&self) -> RecorderResult<RecorderStats> {
        // Held until the join completes
        let mut drain_thread = self.drain_thread.lock();
        let Some(handle) = drain_thread.take() else {
            return Ok(self.stats());
        };

        let pending = {
            let mut registry = self.shared.registry.lock();
            registry.stopping = true;
            registry.pending.len()
        };
        self.shared.wake.notify_all();

        tracing::info!("Stopping recorder, {} entries pending", pending);

        let result = handle.join().map_err(|_| {
            RecorderError::Io(io::Error::new(io::ErrorKind::Other, "drain thread panicked"))
        })?;

        let stats = self.stats();
        drop(drain_thread);
        let _ = self.event_tx.send(RecorderEvent::Stopped);
        tracing::info!(
            "Recorder stopped: {} samples written, {} write failures",
            stats.samples_written,
            stats.write_failures
        );

        result?;
        Ok(stats)
    }

    /// Session this recorder writes
    pub fn session(&self) -> &SessionInfo {
        &self.session
    }

    pub fn session_id(&self) -> u32 {
        self.session.id
    }

    /// Number of registered tracks
    pub fn track_count(&self) -> usize {
        self.shared.registry.lock().tracks.len()
    }

    /// Number of queued entries not yet taken by the drain thread
    pub fn pending_len(&self) -> usize {
        self.shared.registry.lock().pending.len()
    }

    /// Current drain loop state
    pub fn state(&self) -> RecorderState {
        self.shared.registry.lock().state
    }

    /// Snapshot of the drain statistics
    pub fn stats(&self) -> RecorderStats {
        self.stats.lock().clone()
    }

    /// Subscribe to recorder events
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.event_tx.subscribe()
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.drain_thread.get_mut().is_none() {
            return;
        }
        if let Err(e) = self.stop() {
            tracing::error!("Failed to stop recorder cleanly: {}", e);
        }
    }
}

/// Body of the drain thread
///
/// Waits on the condvar while idle or paused, with `idle_wait` as an upper
/// bound. When stopping, keeps draining until the queue is empty.
fn drain_loop(shared: Arc<Shared>, mut writer: SampleWriter, idle_wait: Duration) -> io::Result<()> {
    loop {
        let entry = {
            let mut registry = shared.registry.lock();
            loop {
                if !registry.paused || registry.stopping {
                    if let Some(entry) = registry.pending.pop_front() {
                        registry.state = RecorderState::Draining;
                        break Some(entry);
                    }
                    if registry.stopping {
                        break None;
                    }
                }

                registry.state = if registry.paused {
                    RecorderState::Paused
                } else {
                    RecorderState::Idle
                };
                shared.wake.wait_for(&mut registry, idle_wait);
            }
        };

        match entry {
            Some(entry) => writer.persist(entry),
            None => break,
        }
    }

    let tracks = shared.registry.lock().tracks.clone();
    let result = writer.finish(&tracks);
    shared.registry.lock().state = RecorderState::Stopped;

    tracing::debug!("Drain thread exiting");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::index::{read_index, read_sample, IndexRecord, SessionIndexContents, INDEX_HEADER};
    use crate::recorder::session::index_file_name;
    use crate::recorder::status::{DiskStatus, NullStatus};
    use std::fs;
    use std::path::Path;
    use std::time::Instant;
    use tempfile::tempdir;

    fn recorder(dir: &Path) -> Recorder {
        Recorder::new(RecorderConfig::new(dir), Arc::new(NullStatus)).unwrap()
    }

    fn sample_records(path: &Path) -> Vec<IndexRecord> {
        read_index(path)
            .unwrap()
            .into_iter()
            .filter(|r| matches!(r, IndexRecord::Sample { .. }))
            .collect()
    }

    #[test]
    fn test_session_id_in_empty_dir() {
        let dir = tempdir().unwrap();
        let rec = recorder(dir.path());
        assert_eq!(rec.session_id(), 0);
        assert_eq!(rec.session().index_path, dir.path().join("record_000000.csv"));
        rec.stop().unwrap();
    }

    #[test]
    fn test_session_id_follows_existing_sessions() {
        let dir = tempdir().unwrap();
        for id in 0..=2 {
            fs::write(dir.path().join(index_file_name(id)), "").unwrap();
        }

        let rec = recorder(dir.path());
        assert_eq!(rec.session_id(), 3);
        assert_eq!(rec.stop().unwrap().session_id, 3);
    }

    #[test]
    fn test_consecutive_recorders_get_increasing_ids() {
        let dir = tempdir().unwrap();
        let first = recorder(dir.path());
        let second = recorder(dir.path());
        assert_eq!(first.session_id(), 0);
        assert_eq!(second.session_id(), 1);
    }

    #[test]
    fn test_storage_dir_is_created() {
        let dir = tempdir().unwrap();
        let storage = dir.path().join("VIDEO");
        let rec = recorder(&storage);
        assert!(storage.join("record_000000.csv").is_file());
        rec.stop().unwrap();
    }

    #[test]
    fn test_unusable_storage_dir_fails_at_startup() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let result = Recorder::new(RecorderConfig::new(blocker.join("VIDEO")), Arc::new(NullStatus));
        assert!(matches!(result, Err(RecorderError::SessionIndex { .. })));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = tempdir().unwrap();
        let config = RecorderConfig::new(dir.path()).with_sync_interval(0);
        assert!(matches!(
            Recorder::new(config, Arc::new(NullStatus)),
            Err(RecorderError::Config(_))
        ));
    }

    #[test]
    fn test_track_ids_are_dense() {
        let dir = tempdir().unwrap();
        let rec = recorder(dir.path());

        assert_eq!(rec.add_video_track(1920, 1080, 30, "h264").unwrap(), 0);
        assert_eq!(rec.add_audio_track(2, 48000, "pcm").unwrap(), 1);
        assert_eq!(rec.add_video_track(640, 480, 15, "h264").unwrap(), 2);
        assert_eq!(rec.add_audio_track(1, 8000, "pcm").unwrap(), 3);
        assert_eq!(rec.track_count(), 4);

        // A rejected registration does not consume an id
        assert!(rec.add_audio_track(1, 8000, "").is_err());
        assert_eq!(rec.add_audio_track(1, 16000, "pcm").unwrap(), 4);
    }

    #[test]
    fn test_example_session() {
        let dir = tempdir().unwrap();
        let rec = recorder(dir.path());

        let video = rec.add_video_track(1920, 1080, 30, "h264").unwrap();
        let audio = rec.add_audio_track(2, 48000, "pcm").unwrap();
        assert_eq!((video, audio), (0, 1));

        rec.write_sample(video, 1_000, &[1u8; 100]).unwrap();
        rec.write_sample(audio, 1_500, &[2u8; 40]).unwrap();
        rec.write_sample(video, 34_333, &[3u8; 60]).unwrap();

        let stats = rec.stop().unwrap();
        assert_eq!(stats.samples_written, 3);
        assert_eq!(stats.bytes_written, 200);

        let content = fs::read_to_string(&rec.session().index_path).unwrap();
        let expected = [
            INDEX_HEADER[0],
            INDEX_HEADER[1],
            "new_track,0,video,video_1920x1080_30fps_000000.h264",
            "new_track,1,audio,audio_48000hz_2ch_000000.pcm",
            "0,1000,0,100",
            "1,1500,0,40",
            "0,34333,100,60",
        ];
        assert_eq!(content.lines().collect::<Vec<_>>(), expected);

        let video_len = fs::metadata(dir.path().join("video_1920x1080_30fps_000000.h264"))
            .unwrap()
            .len();
        let audio_len = fs::metadata(dir.path().join("audio_48000hz_2ch_000000.pcm"))
            .unwrap()
            .len();
        assert_eq!((video_len, audio_len), (160, 40));
    }

    #[test]
    fn test_samples_are_indexed_in_submission_order() {
        let dir = tempdir().unwrap();
        let rec = recorder(dir.path());
        let tracks = [
            rec.add_video_track(1280, 720, 60, "h264").unwrap(),
            rec.add_audio_track(2, 44100, "aac").unwrap(),
            rec.add_video_track(320, 240, 10, "mjpeg").unwrap(),
        ];

        let mut submitted = Vec::new();
        for i in 0..90u64 {
            let track_id = tracks[(i * 7 % 3) as usize];
            rec.write_sample(track_id, i, &vec![i as u8; (i % 13 + 1) as usize])
                .unwrap();
            submitted.push((track_id, i));
        }
        rec.stop().unwrap();

        let indexed: Vec<(u32, u64)> = sample_records(&rec.session().index_path)
            .into_iter()
            .map(|r| match r {
                IndexRecord::Sample {
                    track_id,
                    record_time_us,
                    ..
                } => (track_id, record_time_us),
                IndexRecord::NewTrack { .. } => unreachable!(),
            })
            .collect();
        assert_eq!(indexed, submitted);
    }

    #[test]
    fn test_index_reconstructs_track_content() {
        let dir = tempdir().unwrap();
        let rec = recorder(dir.path());
        let video = rec.add_video_track(64, 48, 25, "raw").unwrap();
        let audio = rec.add_audio_track(1, 16000, "pcm").unwrap();

        let mut payloads = Vec::new();
        for i in 0..40u32 {
            let track_id = if i % 3 == 0 { audio } else { video };
            let payload: Vec<u8> = (0..(i * 5 + 1)).map(|b| (b + i) as u8).collect();
            rec.write_sample(track_id, u64::from(i) * 1000, &payload).unwrap();
            payloads.push(payload);
        }
        rec.stop().unwrap();

        let contents = SessionIndexContents::load(&rec.session().index_path).unwrap();
        assert_eq!(contents.samples.len(), payloads.len());

        // Offsets equal the sum of all earlier payloads of the same track
        for track in contents.tracks.values() {
            let mut cursor = 0;
            for record in &track.samples {
                let IndexRecord::Sample { offset, length, .. } = record else {
                    unreachable!()
                };
                assert_eq!(*offset, cursor);
                cursor += length;
            }
            let file_len = fs::metadata(dir.path().join(&track.file_name)).unwrap().len();
            assert_eq!(file_len, cursor);
        }

        for (record, payload) in contents.samples.iter().zip(&payloads) {
            let IndexRecord::Sample { track_id, .. } = record else {
                unreachable!()
            };
            let file_name = &contents.tracks[track_id].file_name;
            assert_eq!(&read_sample(dir.path(), file_name, record).unwrap(), payload);
        }
    }

    #[test]
    fn test_concurrent_producers() {
        let dir = tempdir().unwrap();
        let rec = Arc::new(recorder(dir.path()));

        let handles: Vec<_> = (0..4u32)
            .map(|p| {
                let rec = rec.clone();
                thread::spawn(move || {
                    let track_id = rec.add_audio_track(p + 1, 48000, "pcm").unwrap();
                    for i in 0..50u64 {
                        rec.write_sample(track_id, i, &[p as u8; 16]).unwrap();
                    }
                    track_id
                })
            })
            .collect();

        let mut ids: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3]);

        let stats = rec.stop().unwrap();
        assert_eq!(stats.samples_written, 200);

        let contents = SessionIndexContents::load(&rec.session().index_path).unwrap();
        for track in contents.tracks.values() {
            let times: Vec<u64> = track
                .samples
                .iter()
                .map(|r| match r {
                    IndexRecord::Sample { record_time_us, .. } => *record_time_us,
                    IndexRecord::NewTrack { .. } => unreachable!(),
                })
                .collect();
            assert_eq!(times, (0..50).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_write_sample_does_not_wait_for_drain() {
        let dir = tempdir().unwrap();
        let rec = recorder(dir.path());
        let track_id = rec.add_video_track(1920, 1080, 30, "h264").unwrap();

        rec.pause().unwrap();
        let payload = vec![0xAB; 4096];
        let started = Instant::now();
        for i in 0..500u64 {
            rec.write_sample(track_id, i, &payload).unwrap();
        }
        let elapsed = started.elapsed();

        assert!(elapsed < Duration::from_secs(2), "submission took {elapsed:?}");
        assert!(rec.pending_len() >= 500);
        assert_eq!(rec.stats().samples_written, 0);

        rec.resume().unwrap();
        let stats = rec.stop().unwrap();
        assert_eq!(stats.samples_written, 500);
        assert_eq!(stats.bytes_written, 500 * 4096);
        assert_eq!(rec.state(), RecorderState::Stopped);
    }

    #[test]
    fn test_stop_drains_pending_samples() {
        let dir = tempdir().unwrap();
        let rec = recorder(dir.path());
        let track_id = rec.add_audio_track(2, 48000, "pcm").unwrap();

        rec.pause().unwrap();
        for i in 0..100u64 {
            rec.write_sample(track_id, i, &[7u8; 32]).unwrap();
        }

        // Stop overrides the pause and empties the queue
        let stats = rec.stop().unwrap();
        assert_eq!(stats.samples_written, 100);
        assert_eq!(rec.pending_len(), 0);
        assert_eq!(sample_records(&rec.session().index_path).len(), 100);

        assert!(matches!(
            rec.write_sample(track_id, 101, &[0]),
            Err(RecorderError::Stopped)
        ));
        assert!(matches!(
            rec.add_audio_track(1, 8000, "pcm"),
            Err(RecorderError::Stopped)
        ));
        assert_eq!(rec.stop().unwrap(), stats);
    }

    #[test]
    fn test_concurrent_stop_returns_final_stats() {
        let dir = tempdir().unwrap();
        let rec = Arc::new(recorder(dir.path()));
        let track_id = rec.add_video_track(320, 240, 30, "h264").unwrap();

        rec.pause().unwrap();
        for i in 0..2000u64 {
            rec.write_sample(track_id, i, &[3u8; 256]).unwrap();
        }

        let stoppers: Vec<_> = (0..4)
            .map(|_| {
                let rec = rec.clone();
                thread::spawn(move || rec.stop().unwrap())
            })
            .collect();

        for stopper in stoppers {
            let stats = stopper.join().unwrap();
            assert_eq!(stats.samples_written, 2000);
            assert_eq!(stats.bytes_written, 2000 * 256);
        }
        assert_eq!(rec.state(), RecorderState::Stopped);
    }

    #[test]
    fn test_drop_drains_pending_samples() {
        let dir = tempdir().unwrap();
        let index_path = {
            let rec = recorder(dir.path());
            let track_id = rec.add_video_track(640, 480, 30, "h264").unwrap();
            for i in 0..25u64 {
                rec.write_sample(track_id, i, &[1, 2, 3]).unwrap();
            }
            rec.session().index_path.clone()
        };

        assert_eq!(sample_records(&index_path).len(), 25);
    }

    #[test]
    fn test_unknown_track_is_an_error() {
        let dir = tempdir().unwrap();
        let rec = recorder(dir.path());
        rec.add_video_track(640, 480, 30, "h264").unwrap();

        let err = rec.write_sample(5, 0, &[0u8; 8]).unwrap_err();
        assert!(matches!(err, RecorderError::UnknownTrack(5)));
        assert_eq!(rec.stop().unwrap().samples_written, 0);
    }

    #[test]
    fn test_duplicate_track_is_rejected() {
        let dir = tempdir().unwrap();
        let rec = recorder(dir.path());
        let first = rec.add_video_track(640, 480, 30, "h264").unwrap();
        rec.write_sample(first, 0, b"frame").unwrap();

        let err = rec.add_video_track(640, 480, 30, "h264").unwrap_err();
        assert!(matches!(err, RecorderError::DuplicateTrack(_)));

        // Same parameters with another extension is a different track
        assert_eq!(rec.add_video_track(640, 480, 30, "mjpeg").unwrap(), 1);

        rec.stop().unwrap();
        let len = fs::metadata(dir.path().join("video_640x480_30fps_000000.h264"))
            .unwrap()
            .len();
        assert_eq!(len, 5);
    }

    #[test]
    fn test_events_report_cadence_syncs() {
        let dir = tempdir().unwrap();
        let rec = recorder(dir.path());
        let mut rx = rec.subscribe();

        let track_id = rec.add_video_track(1920, 1080, 30, "h264").unwrap();
        for i in 0..21u64 {
            rec.write_sample(track_id, i, &[0u8; 10]).unwrap();
        }
        let stats = rec.stop().unwrap();
        assert_eq!(stats.index_syncs, 3);

        let mut synced_at = Vec::new();
        let mut added = false;
        let mut stopped = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                RecorderEvent::TrackAdded { track_id: 0, .. } => added = true,
                RecorderEvent::IndexSynced { samples_written } => synced_at.push(samples_written),
                RecorderEvent::Stopped => stopped = true,
                _ => {}
            }
        }
        assert!(added);
        assert!(stopped);
        assert_eq!(synced_at, vec![1, 11, 21]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_payload_disk_full_sets_signal() {
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }

        let dir = tempdir().unwrap();
        // The next session in an empty directory is 0
        std::os::unix::fs::symlink(full, dir.path().join("video_64x48_30fps_000000.h264")).unwrap();

        let status = Arc::new(DiskStatus::new());
        let rec = Recorder::new(RecorderConfig::new(dir.path()), status.clone()).unwrap();
        let mut rx = rec.subscribe();

        let video = rec.add_video_track(64, 48, 30, "h264").unwrap();
        let audio = rec.add_audio_track(1, 8000, "pcm").unwrap();

        rec.write_sample(video, 0, &[0u8; 128]).unwrap();
        rec.write_sample(audio, 1, &[1u8; 16]).unwrap();
        rec.write_sample(video, 2, &[0u8; 128]).unwrap();
        rec.write_sample(audio, 3, &[1u8; 16]).unwrap();

        let stats = rec.stop().unwrap();
        assert!(status.is_disk_full());
        assert_eq!(status.disk_full_events(), 2);
        assert_eq!(stats.disk_full_events, 2);
        assert_eq!(stats.write_failures, 2);
        assert_eq!(stats.samples_written, 2);

        let records = sample_records(&rec.session().index_path);
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| matches!(r, IndexRecord::Sample { track_id, .. } if *track_id == audio)));

        let mut disk_full_events = 0;
        while let Ok(event) = rx.try_recv() {
            if let RecorderEvent::WriteFailed { stage, kind, .. } = event {
                assert_eq!(stage, WriteStage::Payload);
                assert_eq!(kind, WriteFailureKind::DiskFull);
            }
            if event == RecorderEvent::DiskFull {
                disk_full_events += 1;
            }
        }
        assert_eq!(disk_full_events, 2);
    }
}
