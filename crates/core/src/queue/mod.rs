//! Work queue of commit requests.
//!
//! Each pending request is a descriptor object named
//! `<epoch-ms>-<problemId>-<releaseFileName>.commit.json` under the commit
//! prefix. Its JSON body optionally overrides the commit author and message.
//! A request leaves the queue only when [`CommitQueue::retire`] deletes its
//! descriptor, which happens after the change has been pushed.

mod error;
mod reader;
mod types;

pub use error::QueueError;
pub use reader::CommitQueue;
pub use types::{CommitDefaults, CommitMetadata, CommitRequest, DESCRIPTOR_SUFFIX};
