//! Advisory pointer to the most recently retired commit request.
//!
//! The marker is informational only. It is written after a request has been
//! retired and may lag behind the queue if a run stops in between.

use std::sync::Arc;

use tracing::debug;

use crate::store::{RemoteStore, StoreError};

pub struct MarkerStore {
    store: Arc<dyn RemoteStore>,
    key: String,
}

impl MarkerStore {
    pub fn new(store: Arc<dyn RemoteStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the last retired request id, or `None` if no marker has been written.
    pub async fn read(&self) -> Result<Option<String>, StoreError> {
        match self.store.get(&self.key).await {
            Ok(bytes) => {
                let value = String::from_utf8_lossy(&bytes).trim().to_string();
                Ok(Some(value).filter(|v| !v.is_empty()))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn write(&self, request_id: &str) -> Result<(), StoreError> {
        self.store
            .put(&self.key, request_id.as_bytes().to_vec())
            .await?;
        debug!(key = %self.key, request_id, "Marker updated");
        Ok(())
    }
}
