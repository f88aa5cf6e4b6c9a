//! Recorder health reporting
//!
//! The recorder never returns drain failures to producers (they have already
//! returned). Failures are pushed into a [`StatusSink`] supplied at
//! construction instead.

use crate::utils::error::{WriteFailure, WriteFailureKind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Receiver of storage health signals
pub trait StatusSink: Send + Sync {
    /// Storage is exhausted. Called once per out-of-space failure.
    fn mark_disk_full(&self);

    /// A drain step failed, see [`WriteFailure`] for what was kept
    fn report_write_failure(&self, _failure: &WriteFailure) {}
}

/// Sink that ignores every signal
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatus;

impl StatusSink for NullStatus {
    fn mark_disk_full(&self) {}
}

/// Shared storage health state
///
/// Meant to be wrapped in an `Arc` and shared between the recorder and
/// whatever reacts to a full disk (stopping producers, raising an alert).
#[derive(Debug, Default)]
pub struct DiskStatus {
    disk_full: AtomicBool,
    disk_full_events: AtomicU64,
    permission_failures: AtomicU64,
    device_failures: AtomicU64,
    other_failures: AtomicU64,
}

impl DiskStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a full disk has been signalled since the last `clear`
    pub fn is_disk_full(&self) -> bool {
        self.disk_full.load(Ordering::SeqCst)
    }

    /// Number of out-of-space failures seen
    pub fn disk_full_events(&self) -> u64 {
        self.disk_full_events.load(Ordering::SeqCst)
    }

    /// Number of failures of the given kind seen
    pub fn failures(&self, kind: WriteFailureKind) -> u64 {
        match kind {
            WriteFailureKind::DiskFull => self.disk_full_events(),
            WriteFailureKind::PermissionDenied => self.permission_failures.load(Ordering::SeqCst),
            WriteFailureKind::Device => self.device_failures.load(Ordering::SeqCst),
            WriteFailureKind::Other => self.other_failures.load(Ordering::SeqCst),
        }
    }

    /// Reset the disk-full flag, e.g. after space was reclaimed
    pub fn clear(&self) {
        self.disk_full.store(false, Ordering::SeqCst);
    }
}

impl StatusSink for DiskStatus {
    fn mark_disk_full(&self) {
        self.disk_full.store(true, Ordering::SeqCst);
        self.disk_full_events.fetch_add(1, Ordering::SeqCst);
    }

    fn report_write_failure(&self, failure: &WriteFailure) {
        let counter = match failure.kind {
            // counted by mark_disk_full
            WriteFailureKind::DiskFull => return,
            WriteFailureKind::PermissionDenied => &self.permission_failures,
            WriteFailureKind::Device => &self.device_failures,
            WriteFailureKind::Other => &self.other_failures,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::WriteStage;
    use std::io;

    #[test]
    fn test_disk_full_flag() {
        let status = DiskStatus::new();
        assert!(!status.is_disk_full());

        status.mark_disk_full();
        status.mark_disk_full();
        assert!(status.is_disk_full());
        assert_eq!(status.disk_full_events(), 2);

        status.clear();
        assert!(!status.is_disk_full());
        assert_eq!(status.disk_full_events(), 2);
    }

    #[test]
    fn test_failure_counters() {
        let status = DiskStatus::new();
        let failure = WriteFailure::new(
            0,
            WriteStage::Index,
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        status.report_write_failure(&failure);

        assert_eq!(status.failures(WriteFailureKind::PermissionDenied), 1);
        assert_eq!(status.failures(WriteFailureKind::Device), 0);
        assert!(!status.is_disk_full());
    }
}
