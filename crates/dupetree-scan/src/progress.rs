//! Scan progress snapshots.

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Counters broadcast to subscribers while a snapshot is being built.
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    pub files_scanned: u64,
    pub dirs_scanned: u64,
    /// Sum of file sizes seen so far.
    pub bytes_scanned: u64,
    /// Entry most recently processed.
    pub current_path: PathBuf,
    /// Entries that could not be listed or stat'ed.
    pub errors_count: u64,
    pub elapsed: Duration,
    /// Set on the last snapshot of a scan.
    pub finished: bool,
}

impl ScanProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files found per second of wall time.
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.files_scanned as f64 / secs
    }

    /// Files plus directories.
    pub fn total_items(&self) -> u64 {
        self.files_scanned + self.dirs_scanned
    }
}

/// Running counters with a start time, turned into [`ScanProgress`] snapshots.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    start_time: Instant,
    files_scanned: u64,
    dirs_scanned: u64,
    bytes_scanned: u64,
    errors_count: u64,
    current_path: PathBuf,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            files_scanned: 0,
            dirs_scanned: 0,
            bytes_scanned: 0,
            errors_count: 0,
            current_path: PathBuf::new(),
        }
    }

    pub fn record_file(&mut self, size: u64) {
        self.files_scanned += 1;
        self.bytes_scanned += size;
    }

    pub fn record_dir(&mut self) {
        self.dirs_scanned += 1;
    }

    pub fn record_error(&mut self) {
        self.errors_count += 1;
    }

    pub fn set_current_path(&mut self, path: PathBuf) {
        self.current_path = path;
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self, finished: bool) -> ScanProgress {
        ScanProgress {
            files_scanned: self.files_scanned,
            dirs_scanned: self.dirs_scanned,
            bytes_scanned: self.bytes_scanned,
            current_path: self.current_path.clone(),
            errors_count: self.errors_count,
            elapsed: self.start_time.elapsed(),
            finished,
        }
    }
}
