//! Lazy shard computation
//!
//! A [`ShardComputer`] materializes a block that has not been persisted.
//! It runs synchronously inside `get_block`, its result is handed to the
//! caller and never written back, so every miss computes again. Computers
//! must therefore be pure: the same coordinate must always produce the same
//! block.

use ndarray::ArrayD;

use crate::dtype::Element;
use crate::error::MatrixResult;
use crate::matrix::BigMatrix;

/// Fallback for blocks missing from storage
///
/// `compute` receives the matrix in its stored orientation and the stored
/// coordinate (for symmetric matrices, the canonical one), and must return
/// a block of exactly that coordinate's shape. Transposed views and
/// mirrored reads transpose the result themselves.
pub trait ShardComputer<T: Element>: Send + Sync {
    /// Produce the block at `coord`
    fn compute(&self, matrix: &BigMatrix<T>, coord: &[usize]) -> MatrixResult<ArrayD<T>>;
}

impl<T, F> ShardComputer<T> for F
where
    T: Element,
    F: Fn(&BigMatrix<T>, &[usize]) -> MatrixResult<ArrayD<T>> + Send + Sync,
{
    fn compute(&self, matrix: &BigMatrix<T>, coord: &[usize]) -> MatrixResult<ArrayD<T>> {
        self(matrix, coord)
    }
}
