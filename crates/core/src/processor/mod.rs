//! Commit processor: drains the commit-request queue into the data repository.
//!
//! A run holds the single-instance lock for its whole duration and handles
//! requests strictly in queue order. Each request moves through
//!
//! ```text
//! Pending -> Fetched -> Extracted -> Committed -> Pushed -> Retired
//! ```
//!
//! and is only removed from the queue once its commit has been pushed. A run
//! interrupted at any point leaves the request queued; the next run commits
//! whatever was left in the working tree and then processes it again.

mod commit_processor;
mod error;
mod types;

pub use commit_processor::{CommitProcessor, ProcessorSettings};
pub use error::{ProcessorError, RequestError};
pub use types::{FailedRequest, RequestStage, RetiredRequest, RunReport};
