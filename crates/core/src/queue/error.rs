//! Error types for the queue module.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum QueueError {
    /// A descriptor name does not follow `<ts>-<problemId>-<releaseFileName>.commit.json`.
    #[error("Malformed commit descriptor {name:?}: {reason}")]
    MalformedDescriptor { name: String, reason: String },

    /// The descriptor body is not a valid JSON object.
    #[error("Invalid commit body for {request_id}")]
    InvalidBody {
        request_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Queue store error: {0}")]
    Store(#[from] StoreError),
}

impl QueueError {
    pub(crate) fn malformed(name: &str, reason: impl Into<String>) -> Self {
        Self::MalformedDescriptor {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error only concerns a single request.
    ///
    /// The request stays queued; other requests may still be processed.
    pub fn is_request_scoped(&self) -> bool {
        matches!(self, Self::InvalidBody { .. })
    }
}
