//! In-process object store

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::trace;

use super::ObjectStore;
use crate::error::{Error, Result};
use crate::key::ObjectKey;

/// Concurrent in-memory backend
///
/// Objects live in a `DashMap`, so independent keys can be read and
/// written from many tasks without a global lock.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: DashMap<ObjectKey, Bytes>,
}

impl MemoryBackend {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects across all buckets
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store holds no objects
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn exists(&self, key: &ObjectKey) -> Result<bool> {
        Ok(self.objects.contains_key(key))
    }

    async fn get(&self, key: &ObjectKey) -> Result<Bytes> {
        self.objects
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    async fn put(&self, key: &ObjectKey, data: Bytes) -> Result<()> {
        trace!(key = %key, size = data.len(), "Put object");
        self.objects.insert(key.clone(), data);
        Ok(())
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        trace!(key = %key, "Delete object");
        self.objects.remove(key);
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().bucket() == bucket && entry.key().key().starts_with(prefix))
            .map(|entry| entry.key().key().to_string())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
