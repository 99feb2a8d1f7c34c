//! Reading and retiring commit requests.

use std::sync::Arc;

use tracing::{debug, info};

use crate::store::RemoteStore;

use super::error::QueueError;
use super::types::{CommitBody, CommitDefaults, CommitMetadata, CommitRequest, DESCRIPTOR_SUFFIX};

/// Commit-request queue stored under a prefix of the remote store.
pub struct CommitQueue {
    store: Arc<dyn RemoteStore>,
    prefix: String,
}

impl CommitQueue {
    pub fn new(store: Arc<dyn RemoteStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Full key of a request's descriptor.
    pub fn descriptor_key(&self, request: &CommitRequest) -> String {
        format!("{}{}", self.prefix, request.descriptor_name())
    }

    /// Lists pending requests, oldest first.
    ///
    /// Objects that are not descriptors (such as the marker) are skipped. A
    /// descriptor whose name cannot be parsed fails the whole listing.
    pub async fn list_pending(&self) -> Result<Vec<CommitRequest>, QueueError> {
        let keys = self.store.list(&self.prefix).await?;

        let mut requests = Vec::new();
        for key in keys {
            let name = key.strip_prefix(&self.prefix).unwrap_or(&key);
            if !name.ends_with(DESCRIPTOR_SUFFIX) {
                debug!(key = %key, "Skipping non-descriptor object");
                continue;
            }
            requests.push(CommitRequest::from_descriptor_name(name)?);
        }

        requests.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.request_id.cmp(&b.request_id))
        });

        info!(prefix = %self.prefix, count = requests.len(), "Listed pending commit requests");
        Ok(requests)
    }

    /// Downloads a request's descriptor body and resolves its commit metadata.
    pub async fn fetch_request_body(
        &self,
        request: &CommitRequest,
        defaults: &CommitDefaults,
    ) -> Result<CommitMetadata, QueueError> {
        let bytes = self.store.get(&self.descriptor_key(request)).await?;
        let body = CommitBody::parse(&request.request_id, &bytes)?;
        Ok(body.into_metadata(request.problem_id, defaults))
    }

    /// Removes a request from the queue. An already-missing descriptor counts as retired.
    pub async fn retire(&self, request: &CommitRequest) -> Result<(), QueueError> {
        let key = self.descriptor_key(request);
        self.store.delete(&key).await?;
        debug!(key = %key, "Deleted commit descriptor");
        Ok(())
    }
}
