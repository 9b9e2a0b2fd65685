//! Parallel materialization into one dense array

use std::sync::Arc;

use ndarray::{ArrayD, IxDyn, Slice};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::dtype::Element;
use crate::error::{MatrixError, MatrixResult};
use crate::matrix::BigMatrix;

impl<T: Element> BigMatrix<T> {
    /// Fetch every block and assemble the logical dense array
    ///
    /// Runs with the configured `materialize_workers` concurrent reads.
    pub async fn to_dense(&self) -> MatrixResult<ArrayD<T>> {
        self.to_dense_with_workers(self.materialize_workers()).await
    }

    /// [`to_dense`](Self::to_dense) with at most `workers` blocks in flight
    pub async fn to_dense_with_workers(&self, workers: usize) -> MatrixResult<ArrayD<T>> {
        if workers == 0 {
            return Err(MatrixError::Config("workers must be at least 1".to_string()));
        }

        let geometry = self.geometry().clone();
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();

        // Symmetric matrices still need both halves of the dense array.
        for coord in geometry.all_shard_coordinates() {
            let matrix = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| MatrixError::Join(e.to_string()))?;
                let block = matrix.get_block(&coord).await?;
                Ok::<_, MatrixError>((coord, block))
            });
        }

        let mut dense = ArrayD::from_elem(IxDyn(geometry.shape()), T::ZERO);
        let mut assembled = 0usize;
        while let Some(joined) = tasks.join_next().await {
            let (coord, block) = joined.map_err(|e| MatrixError::Join(e.to_string()))??;
            let ranges = geometry.real_ranges(&coord)?;
            dense
                .slice_each_axis_mut(|axis| {
                    let range = ranges[axis.axis.index()];
                    Slice::from(range.start..range.end)
                })
                .assign(&block);
            assembled += 1;
        }

        debug!(matrix = %self, blocks = assembled, workers, "Materialized dense array");
        Ok(dense)
    }
}
