//! Options controlling how a snapshot is built.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// What to enumerate and how.
///
/// Content hashing is not configured here; the snapshot only records sizes.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::check"))]
pub struct ScanConfig {
    /// Directory (or single file) the snapshot is rooted at.
    pub root: PathBuf,

    /// Descend into symlinked directories instead of skipping links.
    #[builder(default)]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Depth limit below the root; `None` walks everything.
    #[builder(default)]
    #[serde(default)]
    pub max_depth: Option<u32>,

    /// Glob patterns matched against entry names. A matching directory is
    /// not entered.
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Enumeration workers: 0 picks a default, 1 walks serially.
    #[builder(default)]
    #[serde(default)]
    pub threads: usize,

    /// Keep dot-prefixed entries.
    #[builder(default = "true")]
    #[serde(default = "keep_hidden")]
    pub include_hidden: bool,
}

fn keep_hidden() -> bool {
    true
}

impl ScanConfigBuilder {
    fn check(&self) -> Result<(), String> {
        match &self.root {
            None => return Err("a root path is required".into()),
            Some(root) if root.as_os_str().is_empty() => {
                return Err("the root path is empty".into());
            }
            Some(_) => {}
        }
        let blank = self
            .ignore_patterns
            .iter()
            .flatten()
            .any(|pattern| pattern.trim().is_empty());
        if blank {
            return Err("ignore patterns must not be blank".into());
        }
        Ok(())
    }
}

impl ScanConfig {
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Defaults for everything except the root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_symlinks: false,
            max_depth: None,
            ignore_patterns: Vec::new(),
            threads: 0,
            include_hidden: true,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
