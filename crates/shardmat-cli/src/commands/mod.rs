//! CLI command implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use shardmat::{BigMatrix, Element, KeyCodec, MatrixConfig, MatrixHeader};
use shardmat_store::{LocalBackend, ObjectKey, ObjectStore};

pub mod create;
pub mod free;
pub mod get;
pub mod info;
pub mod ls;
pub mod rm;

/// Store handle and configuration shared by every command
pub struct Context {
    pub store: Arc<dyn ObjectStore>,
    pub config: MatrixConfig,
}

impl Context {
    /// Open the local store at `root`, layering flag overrides on the environment
    pub async fn connect(root: &Path, bucket: Option<String>, prefix: Option<String>) -> Result<Self> {
        let mut config = MatrixConfig::from_env().context("Invalid SHARDMAT_* environment")?;
        if let Some(bucket) = bucket {
            config = config.with_bucket(bucket);
        }
        if let Some(prefix) = prefix {
            config = config.with_prefix(prefix);
        }
        config.validate()?;

        let store = LocalBackend::new(root)
            .await
            .with_context(|| format!("Failed to open store at {}", root.display()))?;
        tracing::debug!(root = %root.display(), bucket = %config.bucket, prefix = %config.prefix, "Connected");

        Ok(Self {
            store: Arc::new(store),
            config,
        })
    }

    /// Header of matrix `name`, failing if it was never created
    pub async fn header(&self, name: &str) -> Result<MatrixHeader> {
        let codec = KeyCodec::new(&self.config.prefix, name);
        let key = ObjectKey::new(&self.config.bucket, codec.header_key())?;
        MatrixHeader::read(self.store.as_ref(), &key, &self.config.read)
            .await?
            .with_context(|| format!("No matrix named '{name}' (header {key} not found)"))
    }

    /// Reopen `name` from its header
    pub async fn open<T: Element>(&self, name: &str, symmetric: bool) -> Result<BigMatrix<T>> {
        let matrix = BigMatrix::<T>::builder(Arc::clone(&self.store), name)
            .config(self.config.clone())
            .symmetric(symmetric)
            .open()
            .await
            .with_context(|| format!("Failed to open matrix '{name}'"))?;
        Ok(matrix)
    }
}

/// Parse `"4,4"` into `[4, 4]`
pub fn parse_dims(text: &str) -> Result<Vec<usize>> {
    text.split(',')
        .map(|part| {
            part.trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid dimension '{part}' in '{text}'"))
        })
        .collect()
}

/// Call `$func::<T>(args)` for the element type `T` matching `$dtype`
macro_rules! with_dtype {
    ($dtype:expr, $func:ident ( $($arg:expr),* $(,)? )) => {
        match $dtype {
            shardmat::Dtype::Float32 => $func::<f32>($($arg),*).await,
            shardmat::Dtype::Float64 => $func::<f64>($($arg),*).await,
            shardmat::Dtype::Int32 => $func::<i32>($($arg),*).await,
            shardmat::Dtype::Int64 => $func::<i64>($($arg),*).await,
        }
    };
}
pub(crate) use with_dtype;
