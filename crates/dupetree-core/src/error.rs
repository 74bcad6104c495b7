//! Fatal scan errors and per-entry warnings.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A snapshot could not be built at all.
///
/// Trouble with individual entries below the root is not fatal; it is
/// collected as [`ScanWarning`]s on the finished tree.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An ignore pattern is not a valid glob.
    #[error("Invalid ignore pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl ScanError {
    /// Classify an I/O failure on the root path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}

/// What went wrong with a skipped entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    PermissionDenied,
    /// A directory could not be listed.
    ReadError,
    /// An entry was listed but could not be stat'ed.
    MetadataError,
}

/// An entry that was left out of the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub message: String,
    pub kind: WarningKind,
}

impl ScanWarning {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Warning for an I/O error hit while listing `path`.
    pub fn from_io(path: impl Into<PathBuf>, error: &io::Error) -> Self {
        let path = path.into();
        if error.kind() == io::ErrorKind::PermissionDenied {
            let message = format!("Permission denied: {}", path.display());
            Self::new(path, message, WarningKind::PermissionDenied)
        } else {
            Self::new(path, format!("Cannot list directory: {error}"), WarningKind::ReadError)
        }
    }
}
