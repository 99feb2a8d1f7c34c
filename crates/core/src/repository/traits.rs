//! Trait definitions for the repository module.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use super::error::RepositoryError;

/// Commit author identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

impl CommitAuthor {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for CommitAuthor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// Result of a commit attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome {
    Committed { revision: String },
    /// The staged content matched `HEAD`.
    NothingToCommit,
}

impl CommitOutcome {
    pub fn revision(&self) -> Option<&str> {
        match self {
            Self::Committed { revision } => Some(revision),
            Self::NothingToCommit => None,
        }
    }
}

/// Local working copy of the shared data repository.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Root directory of the working copy.
    fn root(&self) -> &Path;

    /// Applies the service identity and pulls the shared branch.
    async fn pre_sync(&self) -> Result<(), RepositoryError>;

    /// Whether the working tree has no changes, untracked files included.
    async fn is_clean(&self) -> Result<bool, RepositoryError>;

    /// Commits everything left in the working tree under the recovery message.
    async fn commit_recovery(&self) -> Result<CommitOutcome, RepositoryError>;

    /// Stages and commits `paths` (relative to [`root`](Self::root)) only.
    async fn stage_and_commit(
        &self,
        paths: &[PathBuf],
        message: &str,
        author: &CommitAuthor,
    ) -> Result<CommitOutcome, RepositoryError>;

    /// Publishes local commits to the shared branch.
    async fn push(&self) -> Result<(), RepositoryError>;
}
