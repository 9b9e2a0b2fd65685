//! Error types for shard-addressable matrices

use thiserror::Error;

use crate::dtype::Dtype;

/// Matrix errors
#[derive(Debug, Error)]
pub enum MatrixError {
    /// Matrix opened by key alone, but no header was persisted
    #[error("header not found for matrix {0}; provide a shape to create it")]
    HeaderMissing(String),

    /// Rank disagreement between shape, shard sizes or a coordinate
    #[error("{context}: expected {expected} axes, got {actual}")]
    ShapeMismatch {
        /// What was being checked
        context: &'static str,
        /// Rank of the matrix
        expected: usize,
        /// Rank supplied by the caller
        actual: usize,
    },

    /// Array handed to `put_block` does not fit the shard at its coordinate
    #[error("incompatible block shape at {coord:?}: expected {expected:?}, got {actual:?}")]
    IncompatibleBlockShape {
        /// Shard coordinate
        coord: Vec<usize>,
        /// Real-range shape of the shard
        expected: Vec<usize>,
        /// Shape of the supplied array
        actual: Vec<usize>,
    },

    /// Shard absent from storage and no shard computer registered
    #[error("block {coord:?} does not exist at {key} and no shard computer is registered")]
    BlockMissing {
        /// Shard coordinate as requested
        coord: Vec<usize>,
        /// Object key, or bucket/root for listings, that was read
        key: String,
    },

    /// Axis-scoped geometry query outside the matrix rank
    #[error("invalid axis {axis} for a matrix of rank {rank}")]
    InvalidAxis {
        /// Requested axis
        axis: usize,
        /// Matrix rank
        rank: usize,
    },

    /// Coordinate component past the end of the shard grid
    #[error("block coordinate {coord:?} outside shard grid {grid:?}")]
    CoordinateOutOfBounds {
        /// Requested coordinate
        coord: Vec<usize>,
        /// Number of shards per axis
        grid: Vec<usize>,
    },

    /// Remote read still failing after every retry
    #[error("remote read of {key} failed after {attempts} attempts: {source}")]
    RemoteRead {
        /// Object key
        key: String,
        /// Attempts made
        attempts: u32,
        /// Last store error
        #[source]
        source: shardmat_store::Error,
    },

    /// Shape or shard sizes violate the header invariant
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Symmetric storage requested for a geometry it cannot fold
    #[error(
        "symmetric matrices need a square rank-2 geometry, got shape {shape:?} with shard sizes {shard_sizes:?}"
    )]
    UnsupportedSymmetricShape {
        /// Declared shape
        shape: Vec<usize>,
        /// Declared shard sizes
        shard_sizes: Vec<usize>,
    },

    /// Element type disagrees with the persisted one
    #[error("invalid dtype: expected {expected}, got {actual}")]
    InvalidDtype {
        /// Dtype of the Rust element type
        expected: Dtype,
        /// Dtype found in storage
        actual: Dtype,
    },

    /// Shard bytes could not be decoded
    #[error("shard codec error: {0}")]
    Codec(String),

    /// Header (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend error outside the retried read path
    #[error("storage error: {0}")]
    Store(#[from] shardmat_store::Error),

    /// Materialization worker failed to complete
    #[error("worker task failed: {0}")]
    Join(String),
}

/// Result type for matrix operations
pub type MatrixResult<T> = Result<T, MatrixError>;
