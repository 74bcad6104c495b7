//! Core types and traits for dupetree.
//!
//! This crate provides the data structures shared by the scanner and the
//! duplicate engine: the arena-backed [`NestedTree`], the [`FileEntry`]
//! payload, the [`FileTree`] snapshot, scan configuration, and the
//! [`Progress`] reporting/cancellation contract.

mod config;
mod error;
mod nested;
mod node;
mod progress;
mod tree;

pub use config::{ScanConfig, ScanConfigBuilder};
pub use error::{ScanError, ScanWarning, WarningKind};
pub use nested::{NestedTree, NodeId, TreeNode};
pub use node::{ContentHash, FileEntry};
pub use progress::{CancelCheck, CancelFlag, NeverCancel, NullSink, Progress, ProgressSink, TracingSink};
pub use tree::{FileTree, TreeStats};
