//! Error types for the processor module.

use thiserror::Error;

use crate::fetcher::FetchError;
use crate::lock::LockError;
use crate::queue::QueueError;
use crate::repository::RepositoryError;
use crate::store::StoreError;

use super::types::RequestStage;

/// Failure while handling a single commit request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RequestError {
    /// Whether only this request is affected and the run may go on.
    pub fn is_request_scoped(&self) -> bool {
        match self {
            Self::Queue(e) => e.is_request_scoped(),
            Self::Fetch(e) => e.is_request_scoped(),
            Self::Repository(_) | Self::Store(_) => false,
        }
    }
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Failed to acquire lock: {0}")]
    Lock(#[from] LockError),

    #[error("Failed to list commit requests: {0}")]
    Queue(#[from] QueueError),

    #[error("Failed to sync data repository: {0}")]
    Sync(#[source] RepositoryError),

    #[error("Failed to commit leftover changes: {0}")]
    Recovery(#[source] RepositoryError),

    #[error("Request {request_id} failed before reaching {stage}: {source}")]
    Request {
        request_id: String,
        stage: RequestStage,
        #[source]
        source: RequestError,
    },
}
