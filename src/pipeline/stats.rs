//! Run statistics.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Counters shared by every worker of one run.
///
/// Uses atomic counters for thread-safe updates from concurrent workers.
#[derive(Debug, Default)]
pub struct RunStats {
    processed: AtomicUsize,
    not_found: AtomicUsize,
    failed: AtomicUsize,
    downloaded: AtomicUsize,
    extracted: AtomicUsize,
    interrupted: AtomicBool,
}

impl RunStats {
    /// Creates a tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn increment_processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_downloaded(&self) {
        self.downloaded.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_extracted(&self) {
        self.extracted.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn mark_interrupted(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    /// Point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> RunSummary {
        RunSummary {
            processed: self.processed.load(Ordering::SeqCst),
            not_found: self.not_found.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            downloaded: self.downloaded.load(Ordering::SeqCst),
            extracted: self.extracted.load(Ordering::SeqCst),
            interrupted: self.interrupted.load(Ordering::SeqCst),
        }
    }
}

/// Final counts of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Identifiers taken off the queue.
    pub processed: usize,
    /// Identifiers with no matching asset (`N/A`).
    pub not_found: usize,
    /// Identifiers that hit an error.
    pub failed: usize,
    /// Assets downloaded.
    pub downloaded: usize,
    /// Assets unpacked from an archive.
    pub extracted: usize,
    /// The run was cancelled before the input was drained.
    pub interrupted: bool,
}

impl RunSummary {
    /// Identifiers that did not fail.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.processed.saturating_sub(self.failed)
    }
}
