//! Text output for the terminal.

use dupetree_analyze::DuplicateReport;
use dupetree_core::{FileEntry, FileTree, NodeId};

/// Per-node byte totals, indexed by `NodeId::index`.
pub fn subtree_sizes(tree: &FileTree) -> Vec<u64> {
    let mut sizes = vec![0u64; tree.tree.len()];
    for id in tree.tree.post_order() {
        let own = tree.entry(id).size;
        let below: u64 = tree
            .tree
            .children(id)
            .iter()
            .map(|child| sizes[child.index()])
            .sum();
        sizes[id.index()] = own + below;
    }
    sizes
}

/// Options for [`print_size_tree`] and [`print_annotated_tree`].
#[derive(Debug, Clone, Copy)]
pub struct TreeView {
    pub max_depth: u32,
    pub top_n: usize,
    pub duplicates_only: bool,
}

/// Print the tree with sizes, largest children first.
pub fn print_size_tree(tree: &FileTree, view: TreeView) {
    let Some(root) = tree.root() else { return };
    let sizes = subtree_sizes(tree);
    print_size_node(tree, &sizes, root, 0, view, sizes[root.index()]);
}

fn print_size_node(
    tree: &FileTree,
    sizes: &[u64],
    id: NodeId,
    depth: u32,
    view: TreeView,
    root_size: u64,
) {
    let entry = tree.entry(id);
    let size = sizes[id.index()];
    let ratio = if root_size > 0 {
        size as f64 / root_size as f64 * 100.0
    } else {
        0.0
    };

    println!(
        "{}{}{:<40} {:>10} {:>5.1}% {}",
        "  ".repeat(depth as usize),
        if entry.is_dir() { "▼ " } else { "  " },
        truncate(&display_name(tree, entry, depth), 40),
        format_size(size),
        ratio,
        make_bar(ratio / 100.0, 10)
    );

    if entry.is_dir() && depth < view.max_depth {
        let mut children = tree.tree.children(id).to_vec();
        children.sort_by(|a, b| sizes[b.index()].cmp(&sizes[a.index()]));

        for &child in children.iter().take(view.top_n) {
            print_size_node(tree, sizes, child, depth + 1, view, root_size);
        }

        let remaining = children.len().saturating_sub(view.top_n);
        if remaining > 0 {
            println!("{}  ... and {} more", "  ".repeat(depth as usize + 1), remaining);
        }
    }
}

/// Print the tree in snapshot order with duplicate markers.
pub fn print_annotated_tree(tree: &FileTree, view: TreeView) {
    let Some(root) = tree.root() else { return };
    print_annotated_node(tree, root, 0, view);
}

fn print_annotated_node(tree: &FileTree, id: NodeId, depth: u32, view: TreeView) {
    let entry = tree.entry(id);
    if view.duplicates_only && !entry.is_duplicate && depth > 0 {
        return;
    }

    let detail = if entry.is_dir() {
        format!("{} items", entry.child_count.unwrap_or(0))
    } else {
        format_size(entry.size)
    };
    println!(
        "{}{:<9} {} ({})",
        "  ".repeat(depth as usize),
        status_marker(entry),
        display_name(tree, entry, depth),
        detail
    );

    if depth < view.max_depth {
        for &child in tree.tree.children(id) {
            print_annotated_node(tree, child, depth + 1, view);
        }
    }
}

/// Bracketed duplicate status of a node.
pub fn status_marker(entry: &FileEntry) -> &'static str {
    match (entry.is_identical, entry.is_duplicate, entry.hash.is_some()) {
        (_, _, false) => "[?]",
        (true, _, _) => "[IDENT]",
        (false, true, _) => "[DUP]",
        (false, false, _) => "[ ]",
    }
}

/// Print a duplicate report, at most `top_n` file groups.
pub fn print_report(report: &DuplicateReport, top_n: usize) {
    println!();
    println!("{}", "─".repeat(70));
    println!(" Duplicate Report");
    println!("{}", "─".repeat(70));
    println!();

    if !report.complete {
        println!(" Detection was interrupted; results are partial.");
        println!();
    }

    if report.groups.is_empty() {
        println!(" No duplicate files found.");
    } else {
        println!(
            " Found {} duplicate groups ({} files)",
            report.group_count, report.files_with_duplicates
        );
        println!(
            " Total wasted space: {}",
            format_size(report.total_wasted_space)
        );
        println!();

        for (i, group) in report.groups.iter().take(top_n).enumerate() {
            println!(
                " Group {} ({} files, {} each, {} wasted)",
                i + 1,
                group.count(),
                format_size(group.size),
                format_size(group.wasted_bytes)
            );
            for path in &group.paths {
                println!("   {}", path.display());
            }
            println!();
        }

        let hidden = report.groups.len().saturating_sub(top_n);
        if hidden > 0 {
            println!(" ... and {hidden} more groups");
            println!();
        }
    }

    if !report.directories.is_empty() {
        println!(" Identical directories:");
        for group in report.directories.iter().take(top_n) {
            println!(
                "   {} copies, {} items, {} each",
                group.paths.len(),
                group.child_count,
                format_size(group.subtree_size)
            );
            for path in &group.paths {
                println!("     {}", path.display());
            }
        }
        println!();
    }

    if !report.unresolved.is_empty() {
        println!(" {} file(s) could not be read", report.unresolved.len());
    }
}

fn display_name(tree: &FileTree, entry: &FileEntry, depth: u32) -> String {
    if depth == 0 {
        tree.root_path.display().to_string()
    } else if entry.is_dir() {
        format!("{}/", entry.name)
    } else {
        entry.name.to_string()
    }
}

/// Create a simple ASCII bar.
fn make_bar(ratio: f64, width: usize) -> String {
    let filled = ((ratio * width as f64).round() as usize).min(width);
    let empty = width - filled;
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

/// Format size in human-readable form.
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate to `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
