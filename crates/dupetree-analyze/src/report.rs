//! Summary of a detection run, ready for display or export.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use dupetree_core::{ContentHash, FileTree, NodeId};

use crate::index::HashGroupIndex;

/// Files sharing the same content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateFileGroup {
    /// Content hash shared by all files in this group.
    pub hash: ContentHash,

    /// Size of each file in bytes.
    pub size: u64,

    /// Paths to all duplicate files.
    pub paths: Vec<PathBuf>,

    /// Wasted space: size * (count - 1).
    pub wasted_bytes: u64,
}

impl DuplicateFileGroup {
    /// Get the number of duplicate files.
    pub fn count(&self) -> usize {
        self.paths.len()
    }

    /// Copies beyond the first.
    pub fn redundant_count(&self) -> usize {
        self.paths.len().saturating_sub(1)
    }
}

/// Directories whose whole subtrees are identical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdenticalDirectoryGroup {
    /// Aggregate hash shared by the directories.
    pub hash: ContentHash,

    /// Direct children of each directory.
    pub child_count: u64,

    /// Bytes below each directory.
    pub subtree_size: u64,

    pub paths: Vec<PathBuf>,
}

/// Results from duplicate analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Groups of duplicate files, sorted by wasted space descending.
    pub groups: Vec<DuplicateFileGroup>,

    /// Identical directory groups, largest subtree first.
    pub directories: Vec<IdenticalDirectoryGroup>,

    /// Total size of all duplicate files.
    pub total_duplicate_size: u64,

    /// Total wasted space (could be reclaimed).
    pub total_wasted_space: u64,

    /// Number of files in the snapshot.
    pub files_analyzed: u64,

    /// Number of files that have duplicates.
    pub files_with_duplicates: u64,

    /// Number of duplicate file groups.
    pub group_count: usize,

    /// Files that could not be hashed.
    pub unresolved: Vec<PathBuf>,

    /// False when the detection run was cancelled.
    pub complete: bool,
}

impl DuplicateReport {
    /// Summarize `index` against the snapshot it was computed from.
    pub fn from_index(tree: &FileTree, index: &HashGroupIndex) -> Self {
        let groups: Vec<DuplicateFileGroup> = index
            .duplicate_groups()
            .filter(|group| !group.is_dir)
            .map(|group| {
                let size = group.signature.size;
                DuplicateFileGroup {
                    hash: group.signature.hash,
                    size,
                    paths: group.paths.clone(),
                    wasted_bytes: size * (group.count() as u64 - 1),
                }
            })
            .sorted_by(|a, b| {
                b.wasted_bytes
                    .cmp(&a.wasted_bytes)
                    .then_with(|| a.paths.cmp(&b.paths))
            })
            .collect();

        let ids: HashMap<&Path, NodeId> = tree
            .tree
            .pre_order()
            .into_iter()
            .map(|id| (tree.entry(id).path.as_path(), id))
            .collect();

        let directories: Vec<IdenticalDirectoryGroup> = index
            .duplicate_groups()
            .filter(|group| group.is_dir)
            .map(|group| {
                let subtree_size = group
                    .paths
                    .first()
                    .and_then(|path| ids.get(path.as_path()))
                    .map(|&id| tree.subtree_size(id))
                    .unwrap_or(0);
                IdenticalDirectoryGroup {
                    hash: group.signature.hash,
                    child_count: group.signature.size,
                    subtree_size,
                    paths: group.paths.clone(),
                }
            })
            .sorted_by(|a, b| {
                b.subtree_size
                    .cmp(&a.subtree_size)
                    .then_with(|| a.paths.cmp(&b.paths))
            })
            .collect();

        let total_duplicate_size = groups.iter().map(|g| g.size * g.count() as u64).sum();
        let total_wasted_space = groups.iter().map(|g| g.wasted_bytes).sum();
        let files_with_duplicates = groups.iter().map(|g| g.count() as u64).sum();
        let group_count = groups.len();

        Self {
            groups,
            directories,
            total_duplicate_size,
            total_wasted_space,
            files_analyzed: tree.total_files(),
            files_with_duplicates,
            group_count,
            unresolved: index.unresolved().to_vec(),
            complete: index.is_complete(),
        }
    }

    /// Check if any duplicates were found.
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Get total number of duplicate files across all groups.
    pub fn total_duplicate_files(&self) -> usize {
        self.groups.iter().map(|g| g.paths.len()).sum()
    }
}
