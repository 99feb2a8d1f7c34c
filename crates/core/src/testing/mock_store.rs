//! Mock object store for testing.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::store::{RemoteStore, StoreError};

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    List,
    Get,
    Put,
    Delete,
}

impl StoreOperation {
    fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Get => "get",
            Self::Put => "put",
            Self::Delete => "delete",
        }
    }
}

/// In-memory implementation of the RemoteStore trait.
///
/// Provides controllable behavior for testing:
/// - Pre-populate and inspect objects
/// - Reverse the listing order to check callers sort explicitly
/// - Fail operations on keys with a given prefix
#[derive(Debug, Clone, Default)]
pub struct MockRemoteStore {
    objects: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    failures: Arc<RwLock<Vec<(StoreOperation, String)>>>,
    reverse_listing: Arc<RwLock<bool>>,
    deleted: Arc<RwLock<Vec<String>>>,
}

impl MockRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an object.
    pub async fn insert(&self, key: &str, data: Vec<u8>) {
        self.objects.write().await.insert(key.to_string(), data);
    }

    pub async fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    /// All stored keys in lexicographic order.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// Keys passed to successful `delete` calls, in call order.
    pub async fn deleted_keys(&self) -> Vec<String> {
        self.deleted.read().await.clone()
    }

    /// Makes `operation` fail for every key starting with `key_prefix`.
    pub async fn fail(&self, operation: StoreOperation, key_prefix: &str) {
        self.failures
            .write()
            .await
            .push((operation, key_prefix.to_string()));
    }

    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    /// Lists in reverse lexicographic order instead of the usual order.
    pub async fn set_reverse_listing(&self, reverse: bool) {
        *self.reverse_listing.write().await = reverse;
    }

    async fn check(&self, operation: StoreOperation, key: &str) -> Result<(), StoreError> {
        let failures = self.failures.read().await;
        if failures
            .iter()
            .any(|(op, prefix)| *op == operation && key.starts_with(prefix.as_str()))
        {
            return Err(StoreError::backend(
                operation.as_str(),
                key,
                "injected failure",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check(StoreOperation::List, prefix).await?;

        let dir = format!("{}/", prefix.trim_end_matches('/'));
        let mut keys: Vec<String> = self
            .objects
            .read()
            .await
            .keys()
            .filter(|key| {
                key.strip_prefix(dir.as_str())
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .cloned()
            .collect();

        if *self.reverse_listing.read().await {
            keys.reverse();
        }
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.check(StoreOperation::Get, key).await?;
        self.object(key).await.ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })
    }

    async fn get_to_file(&self, key: &str, dest: &Path) -> Result<u64, StoreError> {
        let data = self.get(key).await?;
        tokio::fs::write(dest, &data)
            .await
            .map_err(|source| StoreError::Io {
                path: dest.to_path_buf(),
                source,
            })?;
        Ok(data.len() as u64)
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        self.check(StoreOperation::Put, key).await?;
        self.insert(key, data).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check(StoreOperation::Delete, key).await?;
        self.objects.write().await.remove(key);
        self.deleted.write().await.push(key.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_is_not_recursive() {
        let store = MockRemoteStore::new();
        store.insert("a/b/one", vec![1]).await;
        store.insert("a/b/two", vec![2]).await;
        store.insert("a/b/c/three", vec![3]).await;
        store.insert("a/bx", vec![4]).await;

        let keys = store.list("a/b/").await.unwrap();
        assert_eq!(keys, vec!["a/b/one".to_string(), "a/b/two".to_string()]);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MockRemoteStore::new();
        store.insert("a/b/one", vec![1]).await;
        store.fail(StoreOperation::Get, "a/b/").await;

        assert!(store.get("a/b/one").await.is_err());
        store.clear_failures().await;
        assert_eq!(store.get("a/b/one").await.unwrap(), vec![1]);
    }
}
