//! Shard-addressable dense matrices over a flat object store
//!
//! A matrix too large for memory is cut into fixed-size rectangular shards,
//! each stored as its own object. Callers address shards by grid coordinate
//! and never see object keys.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   BigMatrix<T> / Scalar<T>                      │
//! │   get_block · put_block · delete_block · existing · to_dense    │
//! └──────────────┬──────────────────────────────┬───────────────────┘
//!                │ Orientation::resolve          │ ShardComputer
//!                │ (plain / transposed / sym)    │ (lazy fallback)
//! ┌──────────────▼──────────────┐   ┌───────────▼───────────────────┐
//! │ ShardGeometry · KeyCodec    │   │ codec (.npy) · MatrixHeader   │
//! └──────────────┬──────────────┘   └───────────┬───────────────────┘
//!                └──────────────┬───────────────┘
//! ┌─────────────────────────────▼───────────────────────────────────┐
//! │                  shardmat-store::ObjectStore                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use shardmat::{BigMatrix, MatrixConfig};
//! use shardmat_store::LocalBackend;
//!
//! let store = Arc::new(LocalBackend::new("/data/shardmat").await?);
//! let gram = BigMatrix::<f64>::builder(store, "gram")
//!     .config(MatrixConfig::from_env()?)
//!     .shape([4096, 4096])
//!     .shard_sizes([1024, 1024])
//!     .symmetric(true)
//!     .write_header(true)
//!     .open()
//!     .await?;
//!
//! gram.put_block(&block, &[1, 0]).await?;
//! let mirrored = gram.get_block(&[0, 1]).await?; // block.t()
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod compute;
pub mod config;
mod dense;
pub mod dtype;
pub mod error;
pub mod geometry;
pub mod header;
pub mod key;
pub mod matrix;
mod retry;
pub mod scalar;
pub mod symmetric;

pub use compute::ShardComputer;
pub use config::{MatrixConfig, ReadConfig};
pub use dtype::{Dtype, Element};
pub use error::{MatrixError, MatrixResult};
pub use geometry::{RealRange, ShardGeometry};
pub use header::MatrixHeader;
pub use key::KeyCodec;
pub use matrix::{BigMatrix, MatrixBuilder, Orientation};
pub use scalar::Scalar;
