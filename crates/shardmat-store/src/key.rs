//! Bucket-qualified object keys

use std::fmt;

use crate::error::{Error, Result};

/// Address of one object: a bucket plus a flat key
///
/// Keys may contain `/`, but the store treats them as opaque strings;
/// there are no directories, only prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    bucket: String,
    key: String,
}

impl ObjectKey {
    /// Create a key, rejecting empty components and path traversal
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        let key = key.into();

        if bucket.is_empty() {
            return Err(Error::InvalidKey("bucket name is empty".to_string()));
        }
        if bucket.contains('/') {
            return Err(Error::InvalidKey(format!(
                "bucket name contains '/': {bucket}"
            )));
        }
        if key.is_empty() {
            return Err(Error::InvalidKey("object key is empty".to_string()));
        }
        if key.ends_with('/') {
            return Err(Error::InvalidKey(format!("object key ends with '/': {key}")));
        }
        if key.split('/').any(|part| part == ".." || part == ".") {
            return Err(Error::InvalidKey(format!(
                "object key contains a relative path segment: {key}"
            )));
        }

        Ok(Self { bucket, key })
    }

    /// Bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Key within the bucket
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}
