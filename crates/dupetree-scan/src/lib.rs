//! Filesystem snapshot builder for dupetree.
//!
//! Walks a directory with jwalk and assembles a [`FileTree`]: one arena node
//! per file or directory, numbered once the whole walk is done.
//!
//! # Example
//!
//! ```rust,no_run
//! use dupetree_scan::{JwalkScanner, Progress, ScanConfig};
//!
//! let config = ScanConfig::new("/path/to/scan");
//! let scanner = JwalkScanner::new();
//! let tree = scanner.scan(&config, &Progress::silent()).unwrap();
//!
//! println!("Total size: {} bytes", tree.total_size());
//! println!("Total files: {}", tree.total_files());
//! ```
//!
//! # Progress Monitoring
//!
//! Besides the [`Progress`] sink, counter snapshots are broadcast to
//! subscribers:
//!
//! ```rust,no_run
//! use dupetree_scan::JwalkScanner;
//!
//! let scanner = JwalkScanner::new();
//! let mut progress_rx = scanner.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("Scanned {} files", progress.files_scanned);
//!     }
//! });
//! ```

mod progress;
mod scanner;

pub use progress::ScanProgress;
pub use scanner::{JwalkScanner, build_snapshot};

// Re-export core types for convenience
pub use dupetree_core::{
    FileEntry, FileTree, NodeId, Progress, ScanConfig, ScanError, ScanWarning, TreeStats,
    WarningKind,
};
