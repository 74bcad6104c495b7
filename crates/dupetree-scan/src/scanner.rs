//! JWalk-based directory snapshot builder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use globset::{Glob, GlobSet, GlobSetBuilder};
use jwalk::{Parallelism, WalkDir};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use dupetree_core::{
    FileEntry, FileTree, NestedTree, NodeId, Progress, ScanConfig, ScanError, ScanWarning,
    TreeStats, WarningKind,
};

use crate::progress::{ProgressTracker, ScanProgress};

/// Entries between two broadcast progress snapshots.
const BROADCAST_INTERVAL: u64 = 1000;

/// Scanner that walks a directory with jwalk and assembles a [`FileTree`].
pub struct JwalkScanner {
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl JwalkScanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self { progress_tx }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Build a snapshot of `config.root`.
    ///
    /// Only a missing or unreadable root fails the call. Problems with single
    /// entries are recorded as warnings and the walk carries on. When
    /// `progress` reports cancellation the walk stops and the partial tree is
    /// returned with [`FileTree::cancelled`] set.
    pub fn scan(&self, config: &ScanConfig, progress: &Progress) -> Result<FileTree, ScanError> {
        let start = Instant::now();
        let root_path = config
            .root
            .canonicalize()
            .map_err(|e| ScanError::io(&config.root, e))?;
        let root_metadata =
            std::fs::metadata(&root_path).map_err(|e| ScanError::io(&root_path, e))?;

        debug!(root = %root_path.display(), "starting scan");

        if !root_metadata.is_dir() {
            return Ok(self.single_file(config, root_path, root_metadata.len(), start));
        }

        let ignore = compile_ignore_patterns(&config.ignore_patterns)?;
        let mut tracker = ProgressTracker::new();
        let mut stats = TreeStats::new();
        let mut warnings = Vec::new();

        stats.record_dir(0);
        tracker.record_dir();
        progress.note(&format!("Scanning directory: {}", root_path.display()));

        let (entries, cancelled) = self.collect_entries(
            config,
            &root_path,
            ignore,
            progress,
            &mut tracker,
            &mut stats,
            &mut warnings,
        );

        let tree = build_tree(&root_path, entries);
        let _ = self.progress_tx.send(tracker.snapshot(true));

        if cancelled {
            info!(entries = stats.total_entries(), "scan cancelled");
        } else {
            progress.report("Scan complete", 1.0);
            info!(
                files = stats.total_files,
                dirs = stats.total_dirs,
                errors = stats.errors,
                "scan complete"
            );
        }

        let mut file_tree = FileTree::new(
            tree,
            root_path,
            config.clone(),
            stats,
            start.elapsed(),
            warnings,
        );
        file_tree.cancelled = cancelled;
        Ok(file_tree)
    }

    /// Snapshot whose root is a plain file.
    fn single_file(
        &self,
        config: &ScanConfig,
        root_path: PathBuf,
        size: u64,
        start: Instant,
    ) -> FileTree {
        let mut tree = NestedTree::with_capacity(1);
        let root = tree.add_node(FileEntry::new_file(&root_path, size));
        tree.set_root(root);

        let mut stats = TreeStats::new();
        stats.record_file(size, 0);

        FileTree::new(
            tree,
            root_path,
            config.clone(),
            stats,
            start.elapsed(),
            Vec::new(),
        )
    }

    /// Walk below `root_path`, grouping entries by parent directory.
    ///
    /// Returns the grouped entries and whether the walk was cancelled.
    #[allow(clippy::too_many_arguments)]
    fn collect_entries(
        &self,
        config: &ScanConfig,
        root_path: &Path,
        ignore: Option<GlobSet>,
        progress: &Progress,
        tracker: &mut ProgressTracker,
        stats: &mut TreeStats,
        warnings: &mut Vec<ScanWarning>,
    ) -> (HashMap<PathBuf, Vec<EntryInfo>>, bool) {
        let parallelism = match config.threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: Duration::from_millis(100),
            },
            1 => Parallelism::Serial,
            n => Parallelism::RayonNewPool(n),
        };

        let mut walker = WalkDir::new(root_path)
            .parallelism(parallelism)
            .sort(true)
            .skip_hidden(!config.include_hidden)
            .follow_links(config.follow_symlinks)
            .min_depth(0)
            .max_depth(config.max_depth.map(|d| d as usize).unwrap_or(usize::MAX));

        // Filter while reading so that ignored directories are never entered.
        if let Some(ignore) = ignore {
            walker = walker.process_read_dir(move |depth, _path, _state, children| {
                if depth.is_none() {
                    return;
                }
                children.retain(|child| match child {
                    Ok(entry) => !ignore.is_match(entry.file_name()),
                    Err(_) => true,
                });
            });
        }

        let mut entries_by_parent: HashMap<PathBuf, Vec<EntryInfo>> = HashMap::new();
        let mut processed: u64 = 0;

        for entry_result in walker {
            if progress.is_cancelled() {
                return (entries_by_parent, true);
            }

            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    let warning = match err.io_error() {
                        Some(io) => ScanWarning::from_io(&path, io),
                        None => ScanWarning::new(
                            &path,
                            err.to_string(),
                            WarningKind::ReadError,
                        ),
                    };
                    record_failure(progress, tracker, stats, warnings, warning);
                    continue;
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let path = entry.path();
            let depth = entry.depth() as u32;
            let file_type = entry.file_type();
            tracker.set_current_path(path.clone());

            let info = if file_type.is_dir() {
                stats.record_dir(depth);
                tracker.record_dir();
                progress.note(&format!("Scanning directory: {}", path.display()));
                EntryInfo {
                    path,
                    size: 0,
                    is_dir: true,
                }
            } else if file_type.is_file() {
                let size = match entry.metadata() {
                    Ok(m) => m.len(),
                    Err(err) => {
                        let warning = ScanWarning::new(
                            &path,
                            err.to_string(),
                            WarningKind::MetadataError,
                        );
                        record_failure(progress, tracker, stats, warnings, warning);
                        continue;
                    }
                };
                stats.record_file(size, depth);
                tracker.record_file(size);
                EntryInfo {
                    path,
                    size,
                    is_dir: false,
                }
            } else {
                if file_type.is_symlink() {
                    stats.record_symlink();
                }
                continue;
            };

            if let Some(parent) = info.path.parent() {
                entries_by_parent
                    .entry(parent.to_path_buf())
                    .or_default()
                    .push(info);
            }

            processed += 1;
            if processed % BROADCAST_INTERVAL == 0 {
                let _ = self.progress_tx.send(tracker.snapshot(false));
            }
        }

        debug!(
            entries = processed,
            elapsed_ms = tracker.elapsed().as_millis() as u64,
            "walk finished"
        );
        (entries_by_parent, false)
    }
}

impl Default for JwalkScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a snapshot of `root` with default options.
pub fn build_snapshot(root: impl Into<PathBuf>, progress: &Progress) -> Result<FileTree, ScanError> {
    JwalkScanner::new().scan(&ScanConfig::new(root), progress)
}

/// Temporary struct for collecting entry information.
struct EntryInfo {
    path: PathBuf,
    size: u64,
    is_dir: bool,
}

fn record_failure(
    progress: &Progress,
    tracker: &mut ProgressTracker,
    stats: &mut TreeStats,
    warnings: &mut Vec<ScanWarning>,
    warning: ScanWarning,
) {
    warn!(path = %warning.path.display(), "{}", warning.message);
    progress.note(&format!(
        "Error reading {}: {}",
        warning.path.display(),
        warning.message
    ));
    stats.record_error();
    tracker.record_error();
    warnings.push(warning);
}

fn compile_ignore_patterns(patterns: &[String]) -> Result<Option<GlobSet>, ScanError> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ScanError::InvalidPattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }

    builder
        .build()
        .map(Some)
        .map_err(|e| ScanError::InvalidPattern {
            pattern: patterns.join(", "),
            message: e.to_string(),
        })
}

/// Assemble the arena from grouped entries, then number it.
fn build_tree(
    root_path: &Path,
    mut entries_by_parent: HashMap<PathBuf, Vec<EntryInfo>>,
) -> NestedTree<FileEntry> {
    let capacity = entries_by_parent.values().map(Vec::len).sum::<usize>() + 1;
    let mut tree = NestedTree::with_capacity(capacity);
    let root = build_node(&mut tree, root_path, &mut entries_by_parent);
    tree.set_root(root);
    tree
}

/// Recursively add a directory node and its children.
fn build_node(
    tree: &mut NestedTree<FileEntry>,
    path: &Path,
    entries_by_parent: &mut HashMap<PathBuf, Vec<EntryInfo>>,
) -> NodeId {
    let id = tree.add_node(FileEntry::new_directory(path));

    for entry in entries_by_parent.remove(path).unwrap_or_default() {
        let child = if entry.is_dir {
            build_node(tree, &entry.path, entries_by_parent)
        } else {
            tree.add_node(FileEntry::new_file(entry.path, entry.size))
        };
        tree.add_child(id, child);
    }

    id
}
