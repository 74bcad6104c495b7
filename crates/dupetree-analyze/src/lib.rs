//! Duplicate detection for dupetree.
//!
//! Finds duplicate files and identical directory subtrees in a
//! [`FileTree`] snapshot by content:
//!
//! 1. Group files by size (files with a unique size are never read)
//! 2. Quick-hash the first 8 KiB of each size group
//! 3. Full BLAKE3 hash for groups whose quick hashes collide, then
//!    aggregate directory hashes bottom-up from their children
//! 4. Flag identical and duplicate nodes in post-order
//!
//! ```rust,ignore
//! use dupetree_analyze::{DuplicateFinder, DuplicateReport};
//! use dupetree_scan::{JwalkScanner, Progress, ScanConfig};
//!
//! let progress = Progress::silent();
//! let mut tree = JwalkScanner::new()
//!     .scan(&ScanConfig::new("/path/to/scan"), &progress)
//!     .unwrap();
//!
//! let index = DuplicateFinder::new().find_duplicates(&mut tree, &progress);
//! let report = DuplicateReport::from_index(&tree, &index);
//!
//! println!("Found {} duplicate groups", report.group_count);
//! println!("Wasted space: {} bytes", report.total_wasted_space);
//! ```

mod duplicates;
pub mod hasher;
mod index;
mod report;

pub use duplicates::{
    DuplicateConfig, DuplicateConfigBuilder, DuplicateFinder, run_duplicate_detection,
};
pub use hasher::{HashError, HashMode};
pub use index::{DuplicateGroup, DuplicateSignature, HashGroupIndex};
pub use report::{DuplicateFileGroup, DuplicateReport, IdenticalDirectoryGroup};

// Re-export core types
pub use dupetree_core::{ContentHash, FileEntry, FileTree, Progress};
