//! Synchronization of the working copy with the shared data repository.
//!
//! [`GitRepository`] drives the `git` CLI inside the working copy. The
//! pipeline only ever appends commits to the configured branch.

mod error;
mod git;
mod traits;

pub use error::RepositoryError;
pub use git::GitRepository;
pub use traits::{CommitAuthor, CommitOutcome, Repository};
