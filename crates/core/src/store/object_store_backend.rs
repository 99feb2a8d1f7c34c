//! [`RemoteStore`] backed by the `object_store` crate.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use object_store::{
    aws::AmazonS3Builder, local::LocalFileSystem, path::Path as ObjectPath, ClientOptions,
    ObjectStore, PutPayload,
};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::{S3StoreConfig, StoreBackend, StoreConfig};

use super::error::StoreError;
use super::traits::RemoteStore;

/// Object store client shared by all pipeline components.
pub struct ObjectStoreBackend {
    inner: Arc<dyn ObjectStore>,
    name: String,
}

impl ObjectStoreBackend {
    /// Wraps an existing `object_store` client.
    pub fn new(inner: Arc<dyn ObjectStore>, name: impl Into<String>) -> Self {
        Self {
            inner,
            name: name.into(),
        }
    }

    /// Builds the backend selected in the store configuration.
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        match config.backend {
            StoreBackend::Local => {
                let local = config.local.as_ref().ok_or_else(|| {
                    StoreError::Configuration("missing [store.local] section".to_string())
                })?;
                Self::local(&local.root)
            }
            StoreBackend::S3 => {
                let s3 = config.s3.as_ref().ok_or_else(|| {
                    StoreError::Configuration("missing [store.s3] section".to_string())
                })?;
                Self::s3(s3, timeout)
            }
        }
    }

    /// Store rooted at a local directory, created if missing.
    pub fn local(root: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(root).map_err(|e| StoreError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;
        let fs = LocalFileSystem::new_with_prefix(root)
            .map_err(|e| StoreError::Configuration(e.to_string()))?;
        Ok(Self::new(Arc::new(fs), "local"))
    }

    /// Store backed by an S3-compatible bucket.
    ///
    /// Settings not present in the config are read from the usual `AWS_*`
    /// environment variables.
    pub fn s3(config: &S3StoreConfig, timeout: Duration) -> Result<Self, StoreError> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_client_options(ClientOptions::default().with_timeout(timeout));

        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(key_id) = &config.access_key_id {
            builder = builder.with_access_key_id(key_id);
        }
        if let Some(secret) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }

        let store = builder
            .build()
            .map_err(|e| StoreError::Configuration(e.to_string()))?;
        Ok(Self::new(Arc::new(store), "s3"))
    }

    fn object_path(key: &str) -> Result<ObjectPath, StoreError> {
        ObjectPath::parse(key).map_err(|e| StoreError::InvalidKey {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    fn map_err(operation: &'static str, key: &str, err: object_store::Error) -> StoreError {
        match err {
            object_store::Error::NotFound { .. } => StoreError::NotFound {
                key: key.to_string(),
            },
            other => StoreError::backend(operation, key, other.to_string()),
        }
    }
}

#[async_trait]
impl RemoteStore for ObjectStoreBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let prefix_path = Self::object_path(prefix.trim_end_matches('/'))?;

        let listing = match self.inner.list_with_delimiter(Some(&prefix_path)).await {
            Ok(listing) => listing,
            Err(object_store::Error::NotFound { .. }) => return Ok(Vec::new()),
            Err(e) => return Err(Self::map_err("list", prefix, e)),
        };

        let keys: Vec<String> = listing
            .objects
            .into_iter()
            .map(|meta| meta.location.to_string())
            .collect();
        debug!(store = %self.name, prefix, count = keys.len(), "Listed objects");
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = Self::object_path(key)?;
        let result = self
            .inner
            .get(&path)
            .await
            .map_err(|e| Self::map_err("get", key, e))?;
        let bytes = result
            .bytes()
            .await
            .map_err(|e| Self::map_err("get", key, e))?;
        Ok(bytes.to_vec())
    }

    async fn get_to_file(&self, key: &str, dest: &Path) -> Result<u64, StoreError> {
        let path = Self::object_path(key)?;
        let result = self
            .inner
            .get(&path)
            .await
            .map_err(|e| Self::map_err("get", key, e))?;

        let io_err = |e| StoreError::Io {
            path: dest.to_path_buf(),
            source: e,
        };

        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
        let mut stream = result.into_stream();
        let mut total = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Self::map_err("get", key, e))?;
            file.write_all(&chunk).await.map_err(io_err)?;
            total += chunk.len() as u64;
        }

        file.flush().await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
        Ok(total)
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        let path = Self::object_path(key)?;
        self.inner
            .put(&path, PutPayload::from(data))
            .await
            .map_err(|e| Self::map_err("put", key, e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = Self::object_path(key)?;
        match self.inner.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(Self::map_err("delete", key, e)),
        }
    }
}
