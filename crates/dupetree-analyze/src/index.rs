//! Hash to group index built by a detection run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use dupetree_core::ContentHash;

/// Identity of a content class.
///
/// `size` is the byte length for files and the direct child count for
/// directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DuplicateSignature {
    pub size: u64,
    pub hash: ContentHash,
}

impl DuplicateSignature {
    pub fn new(size: u64, hash: ContentHash) -> Self {
        Self { size, hash }
    }
}

/// All nodes sharing one signature, in the order they were indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub signature: DuplicateSignature,
    /// Whether the members are directories.
    pub is_dir: bool,
    pub paths: Vec<PathBuf>,
}

impl DuplicateGroup {
    /// Number of members.
    pub fn count(&self) -> usize {
        self.paths.len()
    }

    /// More than one node carries this signature.
    pub fn is_identical(&self) -> bool {
        self.paths.len() > 1
    }
}

/// Signature-keyed groups plus a path lookup.
///
/// Groups are kept in first-insertion order, which for a detection run is
/// post-order over the snapshot.
#[derive(Debug, Clone, Default)]
pub struct HashGroupIndex {
    groups: IndexMap<DuplicateSignature, DuplicateGroup>,
    by_path: HashMap<PathBuf, DuplicateSignature>,
    unresolved: Vec<PathBuf>,
    complete: bool,
}

impl HashGroupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `path` to the group for `signature`, creating it if needed.
    pub fn insert(&mut self, path: PathBuf, signature: DuplicateSignature, is_dir: bool) {
        self.by_path.insert(path.clone(), signature);
        self.groups
            .entry(signature)
            .or_insert_with(|| DuplicateGroup {
                signature,
                is_dir,
                paths: Vec::new(),
            })
            .paths
            .push(path);
    }

    /// Group for an exact signature.
    pub fn group(&self, signature: &DuplicateSignature) -> Option<&DuplicateGroup> {
        self.groups.get(signature)
    }

    /// Group that `path` belongs to, singleton or not.
    pub fn group_of(&self, path: &Path) -> Option<&DuplicateGroup> {
        self.by_path.get(path).and_then(|sig| self.groups.get(sig))
    }

    /// Group of `path` when at least one other node shares its content.
    pub fn duplicates_of(&self, path: &Path) -> Option<&DuplicateGroup> {
        self.group_of(path).filter(|group| group.is_identical())
    }

    /// Groups with more than one member.
    pub fn duplicate_groups(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.values().filter(|group| group.is_identical())
    }

    /// Every group, singletons included.
    pub fn groups(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.values()
    }

    /// Record a node that could not be hashed.
    pub fn mark_unresolved(&mut self, path: PathBuf) {
        self.unresolved.push(path);
    }

    /// Nodes left without a hash, and so without a group.
    pub fn unresolved(&self) -> &[PathBuf] {
        &self.unresolved
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// False when the run that built this index was cancelled.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub(crate) fn mark_complete(&mut self) {
        self.complete = true;
    }
}
