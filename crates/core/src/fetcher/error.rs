//! Error types for the fetcher module.

use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The archive could not be downloaded.
    #[error("Failed to download {key}")]
    Download {
        key: String,
        #[source]
        source: StoreError,
    },

    /// The downloaded archive has no content.
    #[error("Release archive {key} is empty")]
    EmptyArchive { key: String },

    /// The archive is not a readable zip file.
    #[error("Invalid release archive {path}: {reason}")]
    InvalidArchive { path: PathBuf, reason: String },

    /// An entry would be written outside the target directory.
    #[error("Archive {path} contains unsafe entry {entry:?}")]
    UnsafeEntry { path: PathBuf, entry: String },

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::InvalidArchive {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the problem lies in the release itself rather than the environment.
    pub fn is_request_scoped(&self) -> bool {
        matches!(
            self,
            Self::EmptyArchive { .. } | Self::InvalidArchive { .. } | Self::UnsafeEntry { .. }
        )
    }

    /// Whether a later run may succeed without anyone changing the release.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Download { .. } | Self::Io { .. })
    }
}
