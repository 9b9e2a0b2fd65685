//! # shardmat-store: flat object storage for matrix shards
//!
//! The shard-addressable matrix in `shardmat` never talks to a concrete
//! storage service. It consumes the [`ObjectStore`] capability instead:
//!
//! - `exists` - cheap existence check
//! - `get` / `put` - whole-object reads and writes
//! - `delete` - idempotent removal
//! - `list` - every key under a prefix
//!
//! Two backends ship with the crate:
//!
//! - [`MemoryBackend`]: a concurrent in-process map, used by tests and
//!   single-process pipelines
//! - [`LocalBackend`]: one file per object under a root directory, with
//!   `/` in keys mapped to subdirectories
//!
//! ## Example
//!
//! ```ignore
//! use shardmat_store::{LocalBackend, ObjectKey, ObjectStore};
//!
//! let store = LocalBackend::new("/data/shardmat").await?;
//! let key = ObjectKey::new("bucket", "objects/m/header")?;
//! store.put(&key, Bytes::from_static(b"{}")).await?;
//! assert!(store.exists(&key).await?);
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod key;

pub use backend::{LocalBackend, MemoryBackend, ObjectStore};
pub use error::{Error, Result};
pub use key::ObjectKey;
