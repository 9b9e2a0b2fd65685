//! Storage backends
//!
//! Every backend implements [`ObjectStore`]. Implementations must make
//! `delete` idempotent and must return keys from `list` in ascending order.

mod local;
mod memory;

pub use local::LocalBackend;
pub use memory::MemoryBackend;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::key::ObjectKey;

/// Flat object store capability
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Whether an object exists at `key`
    async fn exists(&self, key: &ObjectKey) -> Result<bool>;

    /// Read a whole object, failing with `NotFound` if absent
    async fn get(&self, key: &ObjectKey) -> Result<Bytes>;

    /// Create or overwrite an object
    async fn put(&self, key: &ObjectKey, data: Bytes) -> Result<()>;

    /// Remove an object; removing an absent object succeeds
    async fn delete(&self, key: &ObjectKey) -> Result<()>;

    /// All keys in `bucket` starting with `prefix`, ascending
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl<S: ObjectStore + ?Sized> ObjectStore for Arc<S> {
    async fn exists(&self, key: &ObjectKey) -> Result<bool> {
        (**self).exists(key).await
    }

    async fn get(&self, key: &ObjectKey) -> Result<Bytes> {
        (**self).get(key).await
    }

    async fn put(&self, key: &ObjectKey, data: Bytes) -> Result<()> {
        (**self).put(key, data).await
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        (**self).delete(key).await
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        (**self).list(bucket, prefix).await
    }
}
