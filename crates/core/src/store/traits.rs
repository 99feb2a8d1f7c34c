//! Trait definitions for the store module.

use async_trait::async_trait;
use std::path::Path;

use super::error::StoreError;

/// A prefix-addressed object store.
///
/// Keys are `/`-separated paths without a leading slash.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns the name of this store implementation.
    fn name(&self) -> &str;

    /// Lists the full keys of objects directly under `prefix` (no recursion).
    ///
    /// A prefix with no objects yields an empty list.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Downloads an object into memory.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Streams an object into `dest`, replacing it. Returns the bytes written.
    async fn get_to_file(&self, key: &str, dest: &Path) -> Result<u64, StoreError>;

    /// Creates or replaces an object.
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError>;

    /// Deletes an object. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
