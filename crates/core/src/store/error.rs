//! Error types for the store module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`RemoteStore`](super::RemoteStore) implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object does not exist.
    #[error("Object not found: {key}")]
    NotFound { key: String },

    /// The key is not a valid object path.
    #[error("Invalid object key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// The backend rejected or failed the request.
    #[error("Store {operation} failed for {key}: {message}")]
    Backend {
        operation: &'static str,
        key: String,
        message: String,
    },

    /// Failed to build the store client.
    #[error("Store configuration error: {0}")]
    Configuration(String),

    /// Local I/O while streaming an object to disk.
    #[error("I/O error writing {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn backend(operation: &'static str, key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            operation,
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
