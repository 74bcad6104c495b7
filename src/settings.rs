//! Optional TOML settings file.
//!
//! ```toml
//! log_level = "info"
//!
//! [scan]
//! include_hidden = false
//! ignore_patterns = [".git", "node_modules"]
//!
//! [duplicates]
//! quick_compare = true
//! threads = 4
//! ```
//!
//! Command-line flags override anything set here.

use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use dupetree_analyze::DuplicateConfig;
use dupetree_scan::ScanConfig;

/// Scan options that can be preset in the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub follow_symlinks: bool,
    pub include_hidden: Option<bool>,
    pub ignore_patterns: Vec<String>,
    pub max_depth: Option<u32>,
    pub threads: Option<usize>,
}

/// Contents of the settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Log filter used when neither `-v` nor `RUST_LOG` is given.
    pub log_level: Option<String>,
    pub scan: ScanSettings,
    pub duplicates: DuplicateConfig,
}

/// Scan flags given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ScanOverrides {
    pub follow_symlinks: bool,
    pub no_hidden: bool,
    pub ignore: Vec<String>,
    pub max_depth: Option<u32>,
    pub threads: Option<usize>,
}

impl Settings {
    /// Load `path`, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read settings file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid settings file {}", path.display()))
    }

    fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Scan configuration for `root`, file values first, flags on top.
    pub fn scan_config(&self, root: PathBuf, flags: &ScanOverrides) -> Result<ScanConfig> {
        let mut ignore_patterns = self.scan.ignore_patterns.clone();
        ignore_patterns.extend(flags.ignore.iter().cloned());

        let include_hidden = !flags.no_hidden && self.scan.include_hidden.unwrap_or(true);

        let config = ScanConfig::builder()
            .root(root)
            .follow_symlinks(flags.follow_symlinks || self.scan.follow_symlinks)
            .include_hidden(include_hidden)
            .ignore_patterns(ignore_patterns)
            .max_depth(flags.max_depth.or(self.scan.max_depth))
            .threads(flags.threads.or(self.scan.threads).unwrap_or(0))
            .build()
            .context("Invalid scan options")?;
        Ok(config)
    }

    /// Duplicate detection configuration with flag overrides applied.
    pub fn duplicate_config(&self, full_compare: bool, threads: Option<usize>) -> DuplicateConfig {
        let mut config = self.duplicates.clone();
        if full_compare {
            config.quick_compare = false;
        }
        if let Some(threads) = threads {
            config.threads = threads;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let settings = Settings::parse("").unwrap();
        assert!(settings.log_level.is_none());
        assert_eq!(settings.scan, ScanSettings::default());
        assert!(settings.duplicates.quick_compare);
    }

    #[test]
    fn test_parse_sections() {
        let settings = Settings::parse(
            r#"
            log_level = "debug"

            [scan]
            include_hidden = false
            ignore_patterns = [".git"]

            [duplicates]
            quick_compare = false
            threads = 3
            "#,
        )
        .unwrap();

        assert_eq!(settings.log_level.as_deref(), Some("debug"));
        assert_eq!(settings.scan.include_hidden, Some(false));
        assert_eq!(settings.scan.ignore_patterns, vec![".git".to_string()]);
        assert!(!settings.duplicates.quick_compare);
        assert_eq!(settings.duplicates.threads, 3);
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        assert!(Settings::parse("[scan]\nmax_depth = \"deep\"").is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let settings = Settings::parse(
            r#"
            [scan]
            ignore_patterns = ["target"]
            max_depth = 2
            threads = 8
            "#,
        )
        .unwrap();
        let flags = ScanOverrides {
            no_hidden: true,
            ignore: vec!["*.tmp".to_string()],
            max_depth: Some(5),
            ..Default::default()
        };

        let config = settings.scan_config(PathBuf::from("/data"), &flags).unwrap();

        assert_eq!(config.ignore_patterns, vec!["target", "*.tmp"]);
        assert_eq!(config.max_depth, Some(5));
        assert_eq!(config.threads, 8);
        assert!(!config.include_hidden);
    }

    #[test]
    fn test_duplicate_overrides() {
        let settings = Settings::default();
        let config = settings.duplicate_config(true, Some(2));
        assert!(!config.quick_compare);
        assert_eq!(config.threads, 2);
    }
}
