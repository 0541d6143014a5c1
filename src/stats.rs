use std::sync::atomic::{AtomicU64, Ordering};

/// Counters collected during an extraction run. Workers and the writer bump
/// them from different threads, so they are relaxed atomics.
#[derive(Debug, Default)]
pub struct ExtractionStats {
    pages_written: AtomicU64,
    pages_skipped: AtomicU64,
    pages_failed: AtomicU64,
    bytes_written: AtomicU64,
}

impl ExtractionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_written(&self, bytes: u64) {
        self.pages_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn inc_skipped(&self) {
        self.pages_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.pages_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn written(&self) -> u64 {
        self.pages_written.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.pages_skipped.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.pages_failed.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }
}
