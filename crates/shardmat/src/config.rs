//! Configuration for matrix storage
//!
//! A [`MatrixConfig`] is passed explicitly to every matrix builder. The
//! assembling code decides where it comes from: defaults, a serialized
//! file, or [`MatrixConfig::from_env`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MatrixError, MatrixResult};

/// Environment variable overriding [`MatrixConfig::bucket`]
pub const ENV_BUCKET: &str = "SHARDMAT_BUCKET";
/// Environment variable overriding [`MatrixConfig::prefix`]
pub const ENV_PREFIX: &str = "SHARDMAT_PREFIX";
/// Environment variable overriding [`ReadConfig::max_attempts`]
pub const ENV_READ_ATTEMPTS: &str = "SHARDMAT_READ_ATTEMPTS";
/// Environment variable overriding [`ReadConfig::backoff_ms`]
pub const ENV_READ_BACKOFF_MS: &str = "SHARDMAT_READ_BACKOFF_MS";
/// Environment variable overriding [`MatrixConfig::materialize_workers`]
pub const ENV_WORKERS: &str = "SHARDMAT_WORKERS";

/// Matrix storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    /// Bucket holding every matrix object
    pub bucket: String,
    /// Prefix prepended to matrix keys
    pub prefix: String,
    /// Shard read retry policy
    pub read: ReadConfig,
    /// Concurrent block fetches used by `to_dense`
    pub materialize_workers: usize,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            bucket: "shardmat".to_string(),
            prefix: "shardmat.objects/".to_string(),
            read: ReadConfig::default(),
            materialize_workers: 16,
        }
    }
}

impl MatrixConfig {
    /// Defaults overridden by `SHARDMAT_*` environment variables
    pub fn from_env() -> MatrixResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> MatrixResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bucket) = lookup(ENV_BUCKET) {
            config.bucket = bucket;
        }
        if let Some(prefix) = lookup(ENV_PREFIX) {
            config.prefix = prefix;
        }
        if let Some(value) = lookup(ENV_READ_ATTEMPTS) {
            config.read.max_attempts = parse_var(ENV_READ_ATTEMPTS, &value)?;
        }
        if let Some(value) = lookup(ENV_READ_BACKOFF_MS) {
            config.read.backoff_ms = parse_var(ENV_READ_BACKOFF_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_WORKERS) {
            config.materialize_workers = parse_var(ENV_WORKERS, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Replace the bucket
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Replace the key prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> MatrixResult<()> {
        if self.bucket.is_empty() {
            return Err(MatrixError::Config("bucket must not be empty".to_string()));
        }
        if self.read.max_attempts == 0 {
            return Err(MatrixError::Config(
                "read.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.materialize_workers == 0 {
            return Err(MatrixError::Config(
                "materialize_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Retry policy for shard reads
///
/// Writes are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
    /// Total attempts per read, including the first
    pub max_attempts: u32,
    /// Base backoff; attempt `n` waits `n * backoff_ms` before retrying
    pub backoff_ms: u64,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_ms: 50,
        }
    }
}

impl ReadConfig {
    /// Delay before the retry following failed attempt `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> MatrixResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| MatrixError::Config(format!("{name}: cannot parse {value:?}")))
}
