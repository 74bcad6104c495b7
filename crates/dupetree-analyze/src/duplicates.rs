//! Duplicate detection over a filesystem snapshot.
//!
//! A run has four phases:
//! 1. Bucket files by exact byte size. Files with a unique size cannot have a
//!    content duplicate and are never read.
//! 2. Quick-hash (first block) each multi-member bucket. A bucket whose quick
//!    hashes are pairwise distinct is settled; on the first collision the
//!    whole bucket is queued for full hashing.
//! 3. Full-hash the queued files, then aggregate bottom-up: a directory's
//!    hash is the hash of its children's sorted digests. Every node is
//!    indexed by its `(size, hash)` signature.
//! 4. Decorate nodes with `is_identical` / `is_duplicate` in post-order.
//!
//! File hashing in phases 2 and 3 fans out over rayon. Aggregation and
//! indexing run on the calling thread.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use derive_builder::Builder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use dupetree_core::{ContentHash, FileTree, NodeId, Progress};

use crate::hasher::{HashMode, fake_size_hash, hash_file, hash_string};
use crate::index::{DuplicateSignature, HashGroupIndex};

/// Prefix for children that have no hash in a directory aggregate.
const UNRESOLVED_TOKEN: &str = "unresolved:";

/// Separator between child digests in a directory aggregate.
const AGGREGATE_SEPARATOR: &str = ", ";

/// Leads every directory aggregate so an empty directory never hashes like
/// an empty file.
const DIRECTORY_TAG: &str = "dir:";

/// Configuration for duplicate detection.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct DuplicateConfig {
    /// Quick-hash size buckets before full hashing.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub quick_compare: bool,

    /// Worker threads for hashing (0 = rayon global pool).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,
}

fn default_true() -> bool {
    true
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            quick_compare: true,
            threads: 0,
        }
    }
}

impl DuplicateConfig {
    /// Create a new config builder.
    pub fn builder() -> DuplicateConfigBuilder {
        DuplicateConfigBuilder::default()
    }
}

/// Result of quick-hash triage for one size bucket.
#[derive(Debug, Default)]
struct BucketTriage {
    /// Files settled by their quick hash.
    resolved: Vec<(NodeId, ContentHash)>,
    /// Files that need a full-content hash.
    full: Vec<NodeId>,
    /// Files that could not be read.
    failed: Vec<NodeId>,
}

/// Duplicate file and directory finder.
pub struct DuplicateFinder {
    config: DuplicateConfig,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with default config.
    pub fn new() -> Self {
        Self {
            config: DuplicateConfig::default(),
        }
    }

    /// Create a new duplicate finder with custom config.
    pub fn with_config(config: DuplicateConfig) -> Self {
        Self { config }
    }

    /// Hash every node of `tree`, set its duplicate flags, and return the
    /// signature index.
    ///
    /// Analysis state left by an earlier run is cleared first. A cancelled
    /// run returns whatever the index held at that point, with
    /// [`HashGroupIndex::is_complete`] false.
    pub fn find_duplicates(&self, tree: &mut FileTree, progress: &Progress) -> HashGroupIndex {
        if self.config.threads == 0 {
            return self.run(tree, progress);
        }

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
        {
            Ok(pool) => pool.install(|| self.run(tree, progress)),
            Err(e) => {
                warn!(threads = self.config.threads, "cannot build hashing pool: {e}");
                self.run(tree, progress)
            }
        }
    }

    fn run(&self, tree: &mut FileTree, progress: &Progress) -> HashGroupIndex {
        let mut index = HashGroupIndex::new();
        tree.clear_analysis();

        progress.report("Grouping files by size", 0.0);
        let Some(buckets) = size_buckets(tree, progress) else {
            debug!("cancelled while grouping by size");
            return index;
        };
        debug!(buckets = buckets.len(), "size grouping done");

        let triage = self.triage(tree, buckets, progress);
        if progress.is_cancelled() {
            debug!("cancelled during quick hashing");
            return index;
        }

        let mut failed: HashSet<NodeId> = HashSet::new();
        let mut queued = Vec::new();
        for bucket in triage {
            for (id, hash) in bucket.resolved {
                tree.entry_mut(id).hash = Some(hash);
            }
            queued.extend(bucket.full);
            failed.extend(bucket.failed);
        }

        let mut full_hashes = full_hash_files(tree, &queued, progress, &mut failed);
        if progress.is_cancelled() {
            debug!("cancelled during full hashing");
            return index;
        }

        if aggregate(tree, &mut full_hashes, &failed, progress, &mut index).is_break() {
            debug!("cancelled during aggregation");
            return index;
        }

        if decorate(tree, &index, progress).is_break() {
            debug!("cancelled while setting flags");
            return index;
        }

        index.mark_complete();
        progress.report("Duplicate detection complete", 1.0);
        info!(
            groups = index.len(),
            duplicate_groups = index.duplicate_groups().count(),
            unresolved = index.unresolved().len(),
            "duplicate detection complete"
        );
        index
    }

    /// Phase 2: quick-hash each candidate bucket in parallel.
    fn triage(
        &self,
        tree: &FileTree,
        buckets: BTreeMap<u64, Vec<NodeId>>,
        progress: &Progress,
    ) -> Vec<BucketTriage> {
        let candidates: Vec<Vec<NodeId>> = buckets
            .into_values()
            .filter(|bucket| bucket.len() > 1)
            .collect();
        let total = candidates.len().max(1);
        let done = AtomicUsize::new(0);

        candidates
            .into_par_iter()
            .filter_map(|bucket| {
                let triage = if self.config.quick_compare {
                    quick_triage(tree, bucket, progress)?
                } else {
                    BucketTriage {
                        full: bucket,
                        ..Default::default()
                    }
                };
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                progress.report(
                    &format!("Quick hashing: {finished}/{total} size groups"),
                    0.1 + 0.3 * finished as f64 / total as f64,
                );
                Some(triage)
            })
            .collect()
    }
}

impl Default for DuplicateFinder {
    fn default() -> Self {
        Self::new()
    }
}

/// Run detection with the default configuration.
pub fn run_duplicate_detection(tree: &mut FileTree, progress: &Progress) -> HashGroupIndex {
    DuplicateFinder::new().find_duplicates(tree, progress)
}

/// Phase 1: file nodes keyed by byte size. `None` when cancelled.
fn size_buckets(tree: &FileTree, progress: &Progress) -> Option<BTreeMap<u64, Vec<NodeId>>> {
    let mut buckets: BTreeMap<u64, Vec<NodeId>> = BTreeMap::new();

    let flow = tree.tree.breadth_first_traverse(|id, node| {
        if progress.is_cancelled() {
            return ControlFlow::Break(());
        }
        let entry = node.data();
        if entry.is_file() {
            buckets.entry(entry.size).or_default().push(id);
        }
        ControlFlow::Continue(())
    });

    flow.is_continue().then_some(buckets)
}

/// Quick-hash one bucket, stopping at the first collision. `None` when
/// cancelled.
fn quick_triage(tree: &FileTree, bucket: Vec<NodeId>, progress: &Progress) -> Option<BucketTriage> {
    let mut seen = HashSet::with_capacity(bucket.len());
    let mut triage = BucketTriage::default();
    let mut collided = false;

    for &id in &bucket {
        if progress.is_cancelled() {
            return None;
        }
        let path = &tree.entry(id).path;
        match hash_file(path, progress, HashMode::Quick) {
            Ok(Some(hash)) => {
                if !seen.insert(hash) {
                    collided = true;
                    break;
                }
                triage.resolved.push((id, hash));
            }
            Ok(None) => return None,
            Err(e) => {
                report_hash_error(progress, path, &e);
                triage.failed.push(id);
            }
        }
    }

    if collided {
        triage.resolved.clear();
        triage.full = bucket
            .into_iter()
            .filter(|id| !triage.failed.contains(id))
            .collect();
    }
    Some(triage)
}

/// Phase 3, first half: full-content hashes of the queued files.
fn full_hash_files(
    tree: &FileTree,
    queued: &[NodeId],
    progress: &Progress,
    failed: &mut HashSet<NodeId>,
) -> HashMap<NodeId, ContentHash> {
    let total = queued.len().max(1);
    let done = AtomicUsize::new(0);

    let results: Vec<(NodeId, Option<ContentHash>)> = queued
        .par_iter()
        .map(|&id| {
            if progress.is_cancelled() {
                return (id, None);
            }
            let path = &tree.entry(id).path;
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress.report(
                &format!("Hashing: {}", path.display()),
                0.4 + 0.5 * finished as f64 / total as f64,
            );
            match hash_file(path, progress, HashMode::Full) {
                Ok(hash) => (id, hash),
                Err(e) => {
                    report_hash_error(progress, path, &e);
                    (id, None)
                }
            }
        })
        .collect();

    let mut hashes = HashMap::with_capacity(results.len());
    for (id, hash) in results {
        match hash {
            Some(hash) => {
                hashes.insert(id, hash);
            }
            None => {
                failed.insert(id);
            }
        }
    }
    hashes
}

/// Phase 3, second half: finalize every node's hash in post-order and index it.
fn aggregate(
    tree: &mut FileTree,
    full_hashes: &mut HashMap<NodeId, ContentHash>,
    failed: &HashSet<NodeId>,
    progress: &Progress,
    index: &mut HashGroupIndex,
) -> ControlFlow<()> {
    progress.report("Aggregating directory hashes", 0.9);

    for id in tree.tree.post_order() {
        if progress.is_cancelled() {
            return ControlFlow::Break(());
        }

        let hash = if tree.entry(id).is_dir() {
            let children = tree.tree.children(id);
            let child_count = children.len() as u64;
            let mut parts: Vec<String> = children
                .iter()
                .map(|&child| {
                    let entry = tree.entry(child);
                    // Quick hashes and size placeholders only identify
                    // content together with the size.
                    match entry.hash {
                        Some(hash) => format!("{}:{}", entry.signature_size(), hash.to_hex()),
                        None => format!("{UNRESOLVED_TOKEN}{}", entry.path.display()),
                    }
                })
                .collect();
            parts.sort_unstable();

            let aggregate = format!("{DIRECTORY_TAG}{}", parts.join(AGGREGATE_SEPARATOR));
            let Some(hash) = hash_string(&aggregate, progress) else {
                return ControlFlow::Break(());
            };
            tree.entry_mut(id).child_count = Some(child_count);
            hash
        } else if let Some(hash) = full_hashes.remove(&id) {
            hash
        } else if failed.contains(&id) {
            index.mark_unresolved(tree.entry(id).path.clone());
            continue;
        } else {
            let entry = tree.entry(id);
            entry.hash.unwrap_or_else(|| fake_size_hash(entry.size))
        };

        let entry = tree.entry_mut(id);
        entry.hash = Some(hash);
        let signature = DuplicateSignature::new(entry.signature_size(), hash);
        index.insert(entry.path.clone(), signature, entry.is_dir());
    }

    ControlFlow::Continue(())
}

/// Phase 4: identical/duplicate flags, children before parents.
fn decorate(tree: &mut FileTree, index: &HashGroupIndex, progress: &Progress) -> ControlFlow<()> {
    for id in tree.tree.post_order() {
        if progress.is_cancelled() {
            return ControlFlow::Break(());
        }

        let entry = tree.entry(id);
        let Some(hash) = entry.hash else { continue };
        let signature = DuplicateSignature::new(entry.signature_size(), hash);
        let identical = index
            .group(&signature)
            .is_some_and(|group| group.is_identical());

        let duplicate = if entry.is_dir() && !identical {
            tree.tree
                .children(id)
                .iter()
                .any(|&child| tree.entry(child).is_duplicate)
        } else {
            identical
        };

        let entry = tree.entry_mut(id);
        entry.is_identical = identical;
        entry.is_duplicate = duplicate;
    }

    ControlFlow::Continue(())
}

fn report_hash_error(progress: &Progress, path: &Path, error: &crate::hasher::HashError) {
    warn!(path = %path.display(), "hashing failed: {error}");
    progress.note(&format!("Error hashing {}: {error}", path.display()));
}
