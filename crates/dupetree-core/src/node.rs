//! File and directory payload types.

use std::fmt;
use std::path::{Path, PathBuf};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// 256-bit content digest used for duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Digest width in bytes.
    pub const LEN: usize = 32;

    /// Create a new ContentHash from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Get the hash as a hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Payload of a snapshot node: one file or directory.
///
/// `hash`, `child_count`, `is_duplicate` and `is_identical` are empty until a
/// duplicate detection pass fills them in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Full path. Unique within a tree.
    pub path: PathBuf,

    /// File/directory name (not full path).
    pub name: CompactString,

    /// Whether this entry is a directory.
    pub is_dir: bool,

    /// Size in bytes. Always 0 for directories.
    pub size: u64,

    /// Number of direct children, set for directories during aggregation.
    pub child_count: Option<u64>,

    /// Working or final content hash.
    pub hash: Option<ContentHash>,

    /// Duplicated content, or (directories) contains a duplicate.
    pub is_duplicate: bool,

    /// Whole content signature matches another node exactly.
    pub is_identical: bool,
}

impl FileEntry {
    /// Create a new file entry.
    pub fn new_file(path: impl Into<PathBuf>, size: u64) -> Self {
        Self::new(path.into(), false, size)
    }

    /// Create a new directory entry.
    pub fn new_directory(path: impl Into<PathBuf>) -> Self {
        Self::new(path.into(), true, 0)
    }

    fn new(path: PathBuf, is_dir: bool, size: u64) -> Self {
        let name = entry_name(&path);
        Self {
            path,
            name,
            is_dir,
            size,
            child_count: None,
            hash: None,
            is_duplicate: false,
            is_identical: false,
        }
    }

    /// Check if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Check if this entry is a file.
    pub fn is_file(&self) -> bool {
        !self.is_dir
    }

    /// Size component of the duplicate signature: bytes for files, child
    /// count for directories.
    pub fn signature_size(&self) -> u64 {
        if self.is_dir {
            self.child_count.unwrap_or(0)
        } else {
            self.size
        }
    }

    /// Forget everything a previous detection pass computed.
    pub fn reset_analysis(&mut self) {
        self.child_count = None;
        self.hash = None;
        self.is_duplicate = false;
        self.is_identical = false;
    }
}

fn entry_name(path: &Path) -> CompactString {
    path.file_name()
        .map(|n| CompactString::new(n.to_string_lossy()))
        .unwrap_or_else(|| CompactString::new(path.to_string_lossy()))
}
