//! Single-value matrices

use std::fmt;
use std::sync::Arc;

use ndarray::{arr1, ArrayD, IxDyn};

use shardmat_store::ObjectStore;

use crate::compute::ShardComputer;
use crate::config::MatrixConfig;
use crate::dtype::Element;
use crate::error::{MatrixError, MatrixResult};
use crate::geometry::ShardGeometry;
use crate::matrix::{BigMatrix, Orientation};

const ORIGIN: [usize; 1] = [0];

/// One value stored as a one-element, one-shard matrix
///
/// No header is written or required.
#[derive(Clone)]
pub struct Scalar<T: Element = f64> {
    matrix: BigMatrix<T>,
}

impl<T: Element> Scalar<T> {
    /// Scalar named `name` in `store`
    pub fn new(
        store: Arc<dyn ObjectStore>,
        name: impl AsRef<str>,
        config: &MatrixConfig,
    ) -> MatrixResult<Self> {
        let geometry = ShardGeometry::new(vec![1], vec![1])?;
        let matrix = BigMatrix::from_parts(
            store,
            name.as_ref(),
            config,
            geometry,
            Orientation::Plain,
            None,
        )?;
        Ok(Self { matrix })
    }

    /// Fall back to `computer` when no value is stored
    ///
    /// The computer is called with coordinate `[0]` and must return a
    /// one-element, rank-1 array.
    pub fn with_shard_computer(self, computer: impl ShardComputer<T> + 'static) -> Self {
        Self {
            matrix: self.matrix.with_shard_computer(computer),
        }
    }

    /// Underlying one-shard matrix
    pub fn matrix(&self) -> &BigMatrix<T> {
        &self.matrix
    }

    /// Scalar name
    pub fn name(&self) -> &str {
        self.matrix.name()
    }

    /// Stored (or computed) value
    pub async fn get(&self) -> MatrixResult<T> {
        let block: ArrayD<T> = self.matrix.get_block(&ORIGIN).await?;
        block
            .get(IxDyn(&ORIGIN))
            .copied()
            .ok_or_else(|| MatrixError::Codec(format!("{self} holds an empty block")))
    }

    /// Store `value`, replacing any previous one
    pub async fn put(&self, value: T) -> MatrixResult<()> {
        self.matrix.put_block(&arr1(&[value]), &ORIGIN).await
    }

    /// Remove the value; absent values are not an error
    pub async fn delete(&self) -> MatrixResult<()> {
        self.matrix.delete_block(&ORIGIN).await
    }
}

impl<T: Element> fmt::Display for Scalar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scalar({})", self.matrix.name())
    }
}

impl<T: Element> fmt::Debug for Scalar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Scalar").field(&self.matrix).finish()
    }
}
