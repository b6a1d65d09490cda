//! Error types for archive extraction.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while unpacking a downloaded asset.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The file carries an extension outside the recognized archive set.
    #[error("{path}: extension '{extension}' is not a supported archive format")]
    UnsupportedFormat {
        /// The downloaded file.
        path: PathBuf,
        /// The unrecognized extension.
        extension: String,
    },

    /// Reading the source or writing an entry failed.
    #[error("IO error extracting to {path}: {source}")]
    Io {
        /// The file being read or written.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The archive content is corrupt or cannot be decoded.
    #[error("cannot extract {path}: {reason}")]
    Archive {
        /// The archive.
        path: PathBuf,
        /// Decoder or container error.
        reason: String,
    },

    /// The blocking extraction task did not complete.
    #[error("extraction task for {path} failed: {reason}")]
    Task {
        /// The archive.
        path: PathBuf,
        /// Join error text.
        reason: String,
    },
}

impl ExtractError {
    /// Creates an `UnsupportedFormat` error.
    pub fn unsupported(path: &Path, extension: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: extension.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Creates an `Archive` error.
    pub fn archive(path: &Path, reason: impl ToString) -> Self {
        Self::Archive {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Creates a `Task` error.
    pub fn task(path: &Path, reason: impl ToString) -> Self {
        Self::Task {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Returns true for the unsupported-suffix case, which is reported as a
    /// warning rather than a failure.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedFormat { .. })
    }
}
