//! Local filesystem backend
//!
//! Layout: `{root}/{bucket}/{key}`, with every `/` in the key mapped to a
//! directory level. Each write lands in its own `.partial` sibling first
//! and is renamed into place, so readers never observe a half-written shard
//! and concurrent writers to one key resolve to the last rename.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, trace};

use super::ObjectStore;
use crate::error::{Error, Result};
use crate::key::ObjectKey;

/// Suffix of in-flight writes
const PARTIAL_SUFFIX: &str = ".partial";

/// Distinguishes the in-flight writes of this process
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Filesystem-backed object store
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Open a backend rooted at `root`, creating the directory if needed
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "Opened local object store");
        Ok(Self { root })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    fn object_path(&self, key: &ObjectKey) -> PathBuf {
        let mut path = self.bucket_path(key.bucket());
        for part in key.key().split('/') {
            path.push(part);
        }
        path
    }

    /// Temp path unique to one write: `{path}.{pid}-{seq}.partial`
    fn partial_path(path: &Path) -> PathBuf {
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut name = path.as_os_str().to_owned();
        name.push(format!(".{}-{seq}{PARTIAL_SUFFIX}", std::process::id()));
        PathBuf::from(name)
    }
}

#[async_trait]
impl ObjectStore for LocalBackend {
    async fn exists(&self, key: &ObjectKey) -> Result<bool> {
        match tokio::fs::metadata(self.object_path(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, key: &ObjectKey) -> Result<Bytes> {
        match tokio::fs::read(self.object_path(key)).await {
            Ok(data) => {
                trace!(key = %key, size = data.len(), "Read object");
                Ok(Bytes::from(data))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &ObjectKey, data: Bytes) -> Result<()> {
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let partial = Self::partial_path(&path);
        let written = match tokio::fs::write(&partial, &data).await {
            Ok(()) => tokio::fs::rename(&partial, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        trace!(key = %key, size = data.len(), "Wrote object");
        Ok(())
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        match tokio::fs::remove_file(self.object_path(key)).await {
            Ok(()) => {
                trace!(key = %key, "Deleted object");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let bucket_path = self.bucket_path(bucket);

        // Only the directory named by the prefix's last complete segment can
        // hold matches, so the walk starts there.
        let mut start = bucket_path.clone();
        if let Some(pos) = prefix.rfind('/') {
            for part in prefix[..pos].split('/') {
                start.push(part);
            }
        }

        let mut keys = Vec::new();
        let mut pending = vec![start];

        while let Some(dir) = pending.pop() {
            let mut read_dir = match tokio::fs::read_dir(&dir).await {
                Ok(read_dir) => read_dir,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = read_dir.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&bucket_path) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");

                if key.ends_with(PARTIAL_SUFFIX) || !key.starts_with(prefix) {
                    continue;
                }
                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }
}
