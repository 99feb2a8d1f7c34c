//! Error types for the lock module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while acquiring or releasing the lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// The recorded holder is alive and may not be terminated by us.
    #[error("Lock {path} is held by process {pid}, which cannot be terminated (permission denied)")]
    HolderUnkillable { pid: u32, path: PathBuf },

    /// Reading, writing or removing the lock record failed.
    #[error("Lock record I/O failed: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LockError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
