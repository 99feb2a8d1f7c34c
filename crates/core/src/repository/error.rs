//! Error types for the repository module.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Pulling the shared branch failed; the working copy needs manual attention.
    #[error("Pull from {remote}/{branch} failed: {stderr}")]
    PullFailed {
        remote: String,
        branch: String,
        stderr: String,
    },

    #[error("Push to {remote}/{branch} failed: {stderr}")]
    PushFailed {
        remote: String,
        branch: String,
        stderr: String,
    },

    /// A git command exited unsuccessfully.
    #[error("`git {command}` failed (exit code {code:?}): {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// git could not be started.
    #[error("Failed to run `git {command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl RepositoryError {
    /// Whether the failure is likely transient (network, remote unavailable).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PullFailed { .. } | Self::PushFailed { .. })
    }
}
