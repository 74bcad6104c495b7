use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dupetree_analyze::{
    DuplicateConfig, DuplicateFinder, DuplicateReport, FileTree, Progress,
    run_duplicate_detection,
};
use dupetree_core::CancelFlag;
use dupetree_scan::build_snapshot;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn scan(root: &Path) -> FileTree {
    build_snapshot(root, &Progress::silent()).unwrap()
}

fn flags(tree: &FileTree, rel: &str) -> (bool, bool) {
    let id = tree.find_by_path(&tree.root_path.join(rel)).unwrap();
    let entry = tree.entry(id);
    (entry.is_duplicate, entry.is_identical)
}

fn root_flags(tree: &FileTree) -> (bool, bool) {
    let entry = tree.entry(tree.root().unwrap());
    (entry.is_duplicate, entry.is_identical)
}

fn abs(tree: &FileTree, rel: &str) -> PathBuf {
    tree.root_path.join(rel)
}

fn create_test_files() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "file1.txt", "duplicate content");
    write(root, "file2.txt", "duplicate content");
    write(root, "file3.txt", "unique content");
    write(root, "subdir/file4.txt", "duplicate content");
    temp
}

fn create_nested_dirs() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "A/A/A/x", "X");
    write(root, "A/A/A/y", "Y");
    write(root, "C/C/C/x", "X");
    write(root, "C/C/C/y", "Y");
    write(root, "B/B/B/x", "X");
    temp
}

#[test]
fn test_duplicate_files_share_one_group() {
    let temp = create_test_files();
    let mut tree = scan(temp.path());

    let index = run_duplicate_detection(&mut tree, &Progress::silent());

    assert!(index.is_complete());
    let groups: Vec<_> = index.duplicate_groups().collect();
    assert_eq!(groups.len(), 1);
    let mut paths = groups[0].paths.clone();
    paths.sort();
    assert_eq!(
        paths,
        vec![
            abs(&tree, "file1.txt"),
            abs(&tree, "file2.txt"),
            abs(&tree, "subdir/file4.txt"),
        ]
    );

    let unique = index.group_of(&abs(&tree, "file3.txt")).unwrap();
    assert_eq!(unique.count(), 1);
    assert!(index.duplicates_of(&abs(&tree, "file3.txt")).is_none());
    assert_eq!(
        index.duplicates_of(&abs(&tree, "file2.txt")).unwrap().count(),
        3
    );

    assert_eq!(flags(&tree, "file1.txt"), (true, true));
    assert_eq!(flags(&tree, "subdir/file4.txt"), (true, true));
    assert_eq!(flags(&tree, "file3.txt"), (false, false));
    // subdir holds only a duplicate file, so its aggregate is unique.
    assert_eq!(flags(&tree, "subdir"), (true, false));
    assert_eq!(root_flags(&tree), (true, false));
}

#[test]
fn test_equal_files_have_equal_hashes() {
    let temp = create_test_files();
    let mut tree = scan(temp.path());
    run_duplicate_detection(&mut tree, &Progress::silent());

    let hash = |rel: &str| {
        let id = tree.find_by_path(&abs(&tree, rel)).unwrap();
        tree.entry(id).hash.unwrap()
    };
    assert_eq!(hash("file1.txt"), hash("file2.txt"));
    assert_eq!(hash("file1.txt"), hash("subdir/file4.txt"));
    assert_ne!(hash("file1.txt"), hash("file3.txt"));
    assert_eq!(tree.files_by_hash(&hash("file1.txt")).len(), 3);
}

#[test]
fn test_identical_subtrees() {
    let temp = create_nested_dirs();
    let mut tree = scan(temp.path());

    run_duplicate_detection(&mut tree, &Progress::silent());

    assert_eq!(flags(&tree, "A/A/A"), (true, true));
    assert_eq!(flags(&tree, "C/C/C"), (true, true));
    assert_eq!(flags(&tree, "A"), (true, true));
    assert_eq!(flags(&tree, "C"), (true, true));
    assert_eq!(flags(&tree, "B/B/B"), (true, false));
    assert_eq!(flags(&tree, "B"), (true, false));
    assert_eq!(flags(&tree, "B/B/B/x"), (true, true));
    assert_eq!(root_flags(&tree), (true, false));
}

#[test]
fn test_identical_implies_duplicate() {
    let temp = create_nested_dirs();
    write(temp.path(), "solo/only", "nothing like it");
    let mut tree = scan(temp.path());

    run_duplicate_detection(&mut tree, &Progress::silent());

    for id in tree.tree.pre_order() {
        let entry = tree.entry(id);
        if entry.is_identical {
            assert!(entry.is_duplicate, "{} identical but not duplicate", entry.path.display());
        }
    }
    assert_eq!(flags(&tree, "solo"), (false, false));
}

#[test]
fn test_child_order_does_not_change_directory_hash() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(root, "first/a", "one");
    write(root, "first/b", "two");
    write(root, "second/a", "two");
    write(root, "second/b", "one");
    let mut tree = scan(root);

    run_duplicate_detection(&mut tree, &Progress::silent());

    let hash = |rel: &str| {
        let id = tree.find_by_path(&abs(&tree, rel)).unwrap();
        tree.entry(id).hash
    };
    assert_eq!(hash("first"), hash("second"));
    assert_eq!(flags(&tree, "first"), (true, true));
}

#[test]
fn test_detection_is_idempotent() {
    let temp = create_nested_dirs();
    let mut tree = scan(temp.path());
    let finder = DuplicateFinder::new();

    let first = finder.find_duplicates(&mut tree, &Progress::silent());
    let snapshot = |tree: &FileTree| {
        tree.tree
            .pre_order()
            .into_iter()
            .map(|id| {
                let e = tree.entry(id);
                (e.path.clone(), e.hash, e.child_count, e.is_duplicate, e.is_identical)
            })
            .collect::<Vec<_>>()
    };
    let before = snapshot(&tree);

    let second = finder.find_duplicates(&mut tree, &Progress::silent());

    assert_eq!(snapshot(&tree), before);
    let groups = |index: &dupetree_analyze::HashGroupIndex| {
        index
            .groups()
            .map(|g| (g.signature, g.paths.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(groups(&first), groups(&second));
}

#[test]
fn test_cancelled_before_work() {
    let temp = create_test_files();
    let mut tree = scan(temp.path());

    // A finished run first, so stale flags would show if they survived.
    run_duplicate_detection(&mut tree, &Progress::silent());

    let flag = CancelFlag::new();
    flag.cancel();
    let index = run_duplicate_detection(&mut tree, &Progress::silent().with_cancel(flag));

    assert!(index.is_empty());
    assert!(!index.is_complete());
    for id in tree.tree.pre_order() {
        let entry = tree.entry(id);
        assert!(!entry.is_duplicate);
        assert!(!entry.is_identical);
    }
}

#[test]
fn test_cancelled_mid_run_is_incomplete() {
    let temp = create_nested_dirs();
    let mut tree = scan(temp.path());

    let polls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&polls);
    let progress =
        Progress::silent().with_cancel_fn(move || counter.fetch_add(1, Ordering::SeqCst) >= 5);

    let index = run_duplicate_detection(&mut tree, &progress);

    assert!(!index.is_complete());
    assert!(polls.load(Ordering::SeqCst) > 5);
}

#[test]
fn test_no_duplicates() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.txt", "alpha");
    write(temp.path(), "b.txt", "bravo");
    write(temp.path(), "nested/c.txt", "charlie!");
    let mut tree = scan(temp.path());

    let index = run_duplicate_detection(&mut tree, &Progress::silent());

    assert_eq!(index.duplicate_groups().count(), 0);
    assert!(tree.duplicate_nodes().is_empty());
    let report = DuplicateReport::from_index(&tree, &index);
    assert!(!report.has_duplicates());
    assert_eq!(report.total_wasted_space, 0);
}

#[test]
fn test_full_compare_finds_same_groups() {
    let temp = create_test_files();
    let mut tree = scan(temp.path());
    let config = DuplicateConfig::builder()
        .quick_compare(false)
        .build()
        .unwrap();

    let index = DuplicateFinder::with_config(config).find_duplicates(&mut tree, &Progress::silent());

    assert_eq!(index.duplicate_groups().count(), 1);
    assert_eq!(flags(&tree, "file2.txt"), (true, true));
}

#[test]
fn test_report_totals() {
    let temp = create_test_files();
    let mut tree = scan(temp.path());
    let index = run_duplicate_detection(&mut tree, &Progress::silent());

    let report = DuplicateReport::from_index(&tree, &index);

    assert!(report.complete);
    assert_eq!(report.group_count, 1);
    assert_eq!(report.files_analyzed, 4);
    assert_eq!(report.files_with_duplicates, 3);
    assert_eq!(report.groups[0].size, 17);
    assert_eq!(report.total_wasted_space, 34);
    assert_eq!(report.total_duplicate_size, 51);
    assert!(report.directories.is_empty());

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("file4.txt"));
}

#[test]
fn test_report_lists_identical_directories() {
    let temp = create_nested_dirs();
    let mut tree = scan(temp.path());
    let index = run_duplicate_detection(&mut tree, &Progress::silent());

    let report = DuplicateReport::from_index(&tree, &index);

    // A ~ C, A/A ~ C/C, A/A/A ~ C/C/C
    assert_eq!(report.directories.len(), 3);
    for group in &report.directories {
        assert_eq!(group.paths.len(), 2);
        assert_eq!(group.subtree_size, 2);
    }
    // X appears three times, Y twice.
    assert_eq!(report.group_count, 2);
    assert_eq!(report.files_with_duplicates, 5);
}

fn write_bytes(root: &Path, rel: &str, bytes: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

#[test]
fn test_unique_sizes_sharing_low_byte_are_not_identical() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    // 5 and 261 differ only above the low byte.
    write_bytes(root, "a/f", &[b'x'; 5]);
    write_bytes(root, "b/g", &[b'y'; 261]);
    let mut tree = scan(root);

    run_duplicate_detection(&mut tree, &Progress::silent());

    assert_eq!(flags(&tree, "a"), (false, false));
    assert_eq!(flags(&tree, "b"), (false, false));
    assert_eq!(root_flags(&tree), (false, false));
}

#[test]
fn test_large_files_sharing_first_block_are_not_identical() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    let mut long_a = vec![b'p'; 9000];
    long_a[8500] = b'q';
    let mut long_b = vec![b'p'; 10000];
    long_b[9500] = b'q';

    // Each sibling pair shares a size but not a first byte, so quick
    // hashes settle both buckets without a full read.
    write_bytes(root, "a/x", &long_a);
    write_bytes(root, "a/y", &vec![b'r'; 9000]);
    write_bytes(root, "b/x", &long_b);
    write_bytes(root, "b/y", &vec![b's'; 10000]);
    let mut tree = scan(root);

    let index = run_duplicate_detection(&mut tree, &Progress::silent());

    assert_eq!(index.duplicate_groups().count(), 0);
    assert_eq!(flags(&tree, "a/x"), (false, false));
    assert_eq!(flags(&tree, "b/x"), (false, false));
    assert_eq!(flags(&tree, "a"), (false, false));
    assert_eq!(flags(&tree, "b"), (false, false));
}
