//! File tree container and statistics.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::config::ScanConfig;
use crate::error::ScanWarning;
use crate::nested::{NestedTree, NodeId};
use crate::node::{ContentHash, FileEntry};

/// Counters accumulated while building a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    /// Total size of all files in bytes.
    pub total_size: u64,
    /// Number of files discovered.
    pub total_files: u64,
    /// Number of directories visited, root included.
    pub total_dirs: u64,
    /// Number of entries that could not be enumerated.
    pub errors: u64,
    /// Symbolic links skipped because links are not followed.
    pub symlinks_skipped: u64,
    /// Maximum depth reached.
    pub max_depth: u32,
}

impl TreeStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a file entry.
    pub fn record_file(&mut self, size: u64, depth: u32) {
        self.total_files += 1;
        self.total_size += size;
        self.max_depth = self.max_depth.max(depth);
    }

    /// Record a directory.
    pub fn record_dir(&mut self, depth: u32) {
        self.total_dirs += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    /// Record an enumeration failure.
    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Record a skipped symlink.
    pub fn record_symlink(&mut self) {
        self.symlinks_skipped += 1;
    }

    /// Files plus directories.
    pub fn total_entries(&self) -> u64 {
        self.total_files + self.total_dirs
    }
}

/// In-memory snapshot of a directory hierarchy.
///
/// Built once per scan; a changed filesystem needs a fresh snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTree {
    /// Ownership tree of entries.
    pub tree: NestedTree<FileEntry>,

    /// Root path that was scanned.
    pub root_path: PathBuf,

    /// When this scan was performed.
    pub scanned_at: SystemTime,

    /// Duration of the scan.
    pub scan_duration: Duration,

    /// Scan configuration used.
    pub config: ScanConfig,

    /// Summary statistics.
    pub stats: TreeStats,

    /// Warnings encountered during scan.
    pub warnings: Vec<ScanWarning>,

    /// Whether enumeration stopped early because of cancellation.
    pub cancelled: bool,
}

impl FileTree {
    /// Create a new file tree. The nested tree must already have its root set.
    pub fn new(
        tree: NestedTree<FileEntry>,
        root_path: PathBuf,
        config: ScanConfig,
        stats: TreeStats,
        scan_duration: Duration,
        warnings: Vec<ScanWarning>,
    ) -> Self {
        Self {
            tree,
            root_path,
            scanned_at: SystemTime::now(),
            scan_duration,
            config,
            stats,
            warnings,
            cancelled: false,
        }
    }

    /// Root node id, if the tree has one.
    pub fn root(&self) -> Option<NodeId> {
        self.tree.root()
    }

    /// Payload of a node.
    pub fn entry(&self, id: NodeId) -> &FileEntry {
        self.tree.data(id)
    }

    /// Mutable payload of a node.
    pub fn entry_mut(&mut self, id: NodeId) -> &mut FileEntry {
        self.tree.data_mut(id)
    }

    /// Get the total size of the tree.
    pub fn total_size(&self) -> u64 {
        self.stats.total_size
    }

    /// Get the total number of files.
    pub fn total_files(&self) -> u64 {
        self.stats.total_files
    }

    /// Get the total number of directories.
    pub fn total_dirs(&self) -> u64 {
        self.stats.total_dirs
    }

    /// Check if there were any warnings during scanning.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Find the node for an exact path.
    pub fn find_by_path(&self, path: &Path) -> Option<NodeId> {
        self.tree.find_node(|node| node.data().path == path)
    }

    /// All file nodes currently carrying `hash`.
    pub fn files_by_hash(&self, hash: &ContentHash) -> Vec<NodeId> {
        self.tree
            .find_all_nodes(|node| node.data().is_file() && node.data().hash.as_ref() == Some(hash))
    }

    /// Sum of file sizes in the subtree rooted at `id`.
    pub fn subtree_size(&self, id: NodeId) -> u64 {
        let mut total = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &self.tree[current];
            total += node.data().size;
            stack.extend(node.children().iter().copied());
        }
        total
    }

    /// Reset hash, child count and flags on every node.
    pub fn clear_analysis(&mut self) {
        for id in self.tree.pre_order() {
            self.tree.data_mut(id).reset_analysis();
        }
    }

    /// Nodes flagged as duplicate, in post-order.
    pub fn duplicate_nodes(&self) -> Vec<NodeId> {
        let mut found = Vec::new();
        let _ = self.tree.depth_first_traverse(|id, node| {
            if node.data().is_duplicate {
                found.push(id);
            }
            ControlFlow::Continue(())
        });
        found
    }
}
