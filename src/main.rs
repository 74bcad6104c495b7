//! dupetree - find duplicate files and identical directory trees.
//!
//! Usage:
//!   dupetree scan [PATH]         Scan and show a size summary
//!   dupetree duplicates [PATH]   Report duplicate files and directories
//!   dupetree tree [PATH]         Print the tree with duplicate markers
//!   dupetree export [PATH]       Export the annotated tree to JSON
//!   dupetree --help              Show help

mod logging;
mod render;
mod settings;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use dupetree_analyze::{DuplicateConfig, DuplicateFinder, DuplicateReport};
use dupetree_core::{FileTree, Progress, TracingSink};
use dupetree_scan::{JwalkScanner, ScanConfig};

use render::TreeView;
use settings::{ScanOverrides, Settings};

#[derive(Parser)]
#[command(
    name = "dupetree",
    version,
    about = "Find duplicate files and identical directory trees",
    long_about = "dupetree hashes file contents to find duplicates, then folds \
                  the hashes up the directory tree so that whole identical \
                  subtrees are reported as one match."
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Worker threads for scanning and hashing (0 = auto)
    #[arg(short = 'j', long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct ScanArgs {
    /// Path to scan
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Follow symbolic links
    #[arg(long)]
    follow_symlinks: bool,

    /// Skip hidden entries
    #[arg(long)]
    no_hidden: bool,

    /// Glob pattern of entry names to skip (repeatable)
    #[arg(short, long)]
    ignore: Vec<String>,

    /// Do not descend deeper than this
    #[arg(long)]
    max_depth: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Scan and show a size summary
    Scan {
        #[command(flatten)]
        scan: ScanArgs,

        /// Maximum depth to display
        #[arg(short, long, default_value = "3")]
        depth: u32,

        /// Number of top entries to show per directory
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,
    },

    /// Report duplicate files and identical directories
    Duplicates {
        #[command(flatten)]
        scan: ScanArgs,

        /// Maximum number of groups to show
        #[arg(short = 'n', long, default_value = "20")]
        top: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Hash every candidate in full instead of triaging by first block
        #[arg(long)]
        full: bool,
    },

    /// Print the tree with duplicate markers
    Tree {
        #[command(flatten)]
        scan: ScanArgs,

        /// Maximum depth to display
        #[arg(short, long, default_value = "3")]
        depth: u32,

        /// Only show duplicate entries
        #[arg(long)]
        duplicates_only: bool,

        /// Hash every candidate in full instead of triaging by first block
        #[arg(long)]
        full: bool,
    },

    /// Export the annotated tree and report to JSON
    Export {
        #[command(flatten)]
        scan: ScanArgs,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Hash every candidate in full instead of triaging by first block
        #[arg(long)]
        full: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Everything a command needs besides its own flags.
struct App {
    settings: Settings,
    threads: Option<usize>,
    cancel: CancellationToken,
}

impl App {
    fn scan_config(&self, args: &ScanArgs) -> Result<ScanConfig> {
        let root = args
            .path
            .canonicalize()
            .with_context(|| format!("Invalid path {}", args.path.display()))?;
        let overrides = ScanOverrides {
            follow_symlinks: args.follow_symlinks,
            no_hidden: args.no_hidden,
            ignore: args.ignore.clone(),
            max_depth: args.max_depth,
            threads: self.threads,
        };
        self.settings.scan_config(root, &overrides)
    }

    fn duplicate_config(&self, full: bool) -> DuplicateConfig {
        self.settings.duplicate_config(full, self.threads)
    }

    fn progress(&self) -> Progress {
        Progress::new(TracingSink).with_cancel(self.cancel.clone())
    }
}

/// Annotated tree plus report, as written by `export`.
#[derive(Serialize)]
struct Export<'a> {
    tree: &'a FileTree,
    report: &'a DuplicateReport,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    logging::init(cli.verbose, settings.log_level.as_deref())?;

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let ctx = App {
        settings,
        threads: cli.threads,
        cancel,
    };

    match cli.command {
        Command::Scan { scan, depth, top } => run_scan(&ctx, &scan, depth, top).await,
        Command::Duplicates {
            scan,
            top,
            format,
            full,
        } => run_duplicates(&ctx, &scan, top, format, full).await,
        Command::Tree {
            scan,
            depth,
            duplicates_only,
            full,
        } => run_tree(&ctx, &scan, depth, duplicates_only, full).await,
        Command::Export { scan, output, full } => run_export(&ctx, &scan, output, full).await,
    }
}

/// Cancel outstanding work on Ctrl-C.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping");
            cancel.cancel();
        }
    });
}

/// Build a snapshot on a blocking thread while logging broadcast progress.
async fn scan_tree(ctx: &App, args: &ScanArgs) -> Result<FileTree> {
    let config = ctx.scan_config(args)?;
    let progress = ctx.progress();

    eprintln!("Scanning {}...", config.root.display());

    let scanner = JwalkScanner::new();
    let mut updates = scanner.subscribe();
    let watcher = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => tracing::info!(
                    files = update.files_scanned,
                    dirs = update.dirs_scanned,
                    bytes = update.bytes_scanned,
                    rate = update.files_per_second(),
                    "{}",
                    update.current_path.display()
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Progress receiver lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let tree = tokio::task::spawn_blocking(move || scanner.scan(&config, &progress))
        .await
        .context("Scan task failed")?
        .context("Scan failed")?;
    // The scanner was dropped with the blocking task, so the channel is closed.
    let _ = watcher.await;

    for warning in &tree.warnings {
        tracing::warn!(path = %warning.path.display(), "{}", warning.message);
    }
    if tree.cancelled {
        return Err(eyre!("Scan interrupted"));
    }
    Ok(tree)
}

/// Run duplicate detection on a blocking thread.
async fn detect(ctx: &App, mut tree: FileTree, full: bool) -> Result<(FileTree, DuplicateReport)> {
    let finder = DuplicateFinder::with_config(ctx.duplicate_config(full));
    let progress = ctx.progress();

    eprintln!("Finding duplicates...");

    let (tree, report) = tokio::task::spawn_blocking(move || {
        let index = finder.find_duplicates(&mut tree, &progress);
        let report = DuplicateReport::from_index(&tree, &index);
        (tree, report)
    })
    .await
    .context("Detection task failed")?;

    if !report.complete {
        tracing::warn!("Duplicate detection did not finish; results are partial");
    }
    Ok((tree, report))
}

async fn run_scan(ctx: &App, args: &ScanArgs, depth: u32, top_n: usize) -> Result<()> {
    let tree = scan_tree(ctx, args).await?;

    print_summary(&tree);
    render::print_size_tree(
        &tree,
        TreeView {
            max_depth: depth,
            top_n,
            duplicates_only: false,
        },
    );

    if tree.has_warnings() {
        println!();
        println!("{} warning(s) during scan", tree.warnings.len());
    }

    Ok(())
}

async fn run_duplicates(
    ctx: &App,
    args: &ScanArgs,
    top_n: usize,
    format: OutputFormat,
    full: bool,
) -> Result<()> {
    let tree = scan_tree(ctx, args).await?;
    let (_tree, report) = detect(ctx, tree, full).await?;

    match format {
        OutputFormat::Text => render::print_report(&report, top_n),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

async fn run_tree(
    ctx: &App,
    args: &ScanArgs,
    depth: u32,
    duplicates_only: bool,
    full: bool,
) -> Result<()> {
    let tree = scan_tree(ctx, args).await?;
    let (tree, report) = detect(ctx, tree, full).await?;

    print_summary(&tree);
    render::print_annotated_tree(
        &tree,
        TreeView {
            max_depth: depth,
            top_n: usize::MAX,
            duplicates_only,
        },
    );
    println!();
    println!(
        "{} duplicate group(s), {} wasted",
        report.group_count,
        render::format_size(report.total_wasted_space)
    );

    Ok(())
}

async fn run_export(
    ctx: &App,
    args: &ScanArgs,
    output: Option<PathBuf>,
    full: bool,
) -> Result<()> {
    let tree = scan_tree(ctx, args).await?;
    let (tree, report) = detect(ctx, tree, full).await?;

    let json = serde_json::to_string_pretty(&Export {
        tree: &tree,
        report: &report,
    })?;

    match output {
        Some(output_path) => {
            write_export(&output_path, &json)?;
            eprintln!("Exported to {}", output_path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn write_export(path: &Path, json: &str) -> Result<()> {
    std::fs::write(path, json).with_context(|| format!("Cannot write {}", path.display()))
}

fn print_summary(tree: &FileTree) {
    let scanned_at: DateTime<Local> = tree.scanned_at.into();

    println!();
    println!("{}", "─".repeat(60));
    println!(
        " {} - {}",
        tree.root_path.display(),
        render::format_size(tree.total_size())
    );
    println!(
        " {} files, {} directories",
        tree.total_files(),
        tree.total_dirs()
    );
    println!(
        " Scanned {} in {:.2}s",
        scanned_at.format("%Y-%m-%d %H:%M:%S"),
        tree.scan_duration.as_secs_f64()
    );
    println!("{}", "─".repeat(60));
    println!();
}
