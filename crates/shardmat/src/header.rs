//! Persisted matrix header
//!
//! One small JSON object per matrix records the base-orientation geometry
//! and element type, so the matrix can be reopened from its name alone.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use shardmat_store::{ObjectKey, ObjectStore};

use crate::config::ReadConfig;
use crate::dtype::Dtype;
use crate::error::{MatrixError, MatrixResult};
use crate::geometry::ShardGeometry;
use crate::retry::read_with_retry;

/// `{shape, shard_sizes, dtype}` as stored at `{prefix}{name}/header`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixHeader {
    /// Matrix shape
    pub shape: Vec<usize>,
    /// Shard size per axis
    pub shard_sizes: Vec<usize>,
    /// Element type
    pub dtype: Dtype,
}

impl MatrixHeader {
    /// Header describing `geometry`
    pub fn new(geometry: &ShardGeometry, dtype: Dtype) -> Self {
        Self {
            shape: geometry.shape().to_vec(),
            shard_sizes: geometry.shard_sizes().to_vec(),
            dtype,
        }
    }

    /// Validated geometry recorded in the header
    pub fn geometry(&self) -> MatrixResult<ShardGeometry> {
        ShardGeometry::new(self.shape.clone(), self.shard_sizes.clone())
    }

    /// JSON encoding
    pub fn to_bytes(&self) -> MatrixResult<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Parse and validate a JSON header
    pub fn from_bytes(data: &[u8]) -> MatrixResult<Self> {
        let header: Self = serde_json::from_slice(data)?;
        header.geometry()?;
        Ok(header)
    }

    /// Read the header at `key` under the `read` retry policy; an absent
    /// object is `Ok(None)`
    pub async fn read(
        store: &dyn ObjectStore,
        key: &ObjectKey,
        read: &ReadConfig,
    ) -> MatrixResult<Option<Self>> {
        match read_with_retry(read, &key.to_string(), || store.get(key)).await {
            Ok(data) => {
                let header = Self::from_bytes(&data)?;
                debug!(key = %key, shape = ?header.shape, dtype = %header.dtype, "Read header");
                Ok(Some(header))
            }
            Err(MatrixError::Store(e)) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write the header to `key`, replacing any previous one
    pub async fn write(&self, store: &dyn ObjectStore, key: &ObjectKey) -> MatrixResult<()> {
        store.put(key, self.to_bytes()?).await?;
        info!(key = %key, shape = ?self.shape, shard_sizes = ?self.shard_sizes, "Wrote header");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardmat_store::MemoryBackend;

    #[test]
    fn test_json_layout() {
        let geometry = ShardGeometry::new(vec![4, 6], vec![2, 3]).unwrap();
        let header = MatrixHeader::new(&geometry, Dtype::Float64);
        let json: serde_json::Value = serde_json::from_slice(&header.to_bytes().unwrap()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"shape": [4, 6], "shard_sizes": [2, 3], "dtype": "float64"})
        );
    }

    #[test]
    fn test_invalid_header_rejected() {
        let result = MatrixHeader::from_bytes(br#"{"shape": [4, 4], "shard_sizes": [2], "dtype": "float64"}"#);
        assert!(matches!(result, Err(MatrixError::ShapeMismatch { .. })));

        let result = MatrixHeader::from_bytes(b"not json");
        assert!(matches!(result, Err(MatrixError::Serialization(_))));
    }

    #[test]
    fn test_legacy_dtype_tag() {
        let header = MatrixHeader::from_bytes(
            br#"{"shape": [8], "shard_sizes": [4], "dtype": "<class 'numpy.float64'>"}"#,
        )
        .unwrap();
        assert_eq!(header.dtype, Dtype::Float64);
    }

    #[tokio::test]
    async fn test_read_write() {
        let store = MemoryBackend::new();
        let key = ObjectKey::new("bucket", "objects/m/header").unwrap();

        assert_eq!(
            MatrixHeader::read(&store, &key, &ReadConfig::default()).await.unwrap(),
            None
        );

        let geometry = ShardGeometry::new(vec![3, 3], vec![1, 1]).unwrap();
        let header = MatrixHeader::new(&geometry, Dtype::Int32);
        header.write(&store, &key).await.unwrap();

        assert_eq!(
            MatrixHeader::read(&store, &key, &ReadConfig::default()).await.unwrap(),
            Some(header)
        );
    }
}
