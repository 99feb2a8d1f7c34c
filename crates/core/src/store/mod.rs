//! Remote object store used for the commit queue, release archives and marker.
//!
//! Components receive an `Arc<dyn RemoteStore>` at construction time.
//! [`ObjectStoreBackend`] adapts the `object_store` crate (local filesystem
//! or any S3-compatible service); tests use `testing::MockRemoteStore`.

mod error;
mod object_store_backend;
mod traits;

pub use error::StoreError;
pub use object_store_backend::ObjectStoreBackend;
pub use traits::RemoteStore;
