//! Symmetric storage folding
//!
//! A symmetric matrix stores one shard per mirror pair. The stored
//! representative is the canonical coordinate, the one whose first
//! component exceeds its last; every other coordinate is read by
//! transposing its mirror.
//!
//! ```text
//!        col 0   col 1   col 2
//! row 0  (0,0)   (1,0)T  (2,0)T
//! row 1  (1,0)   (1,1)   (2,1)T
//! row 2  (2,0)   (2,1)   (2,2)        T = read from the mirror, transposed
//! ```

use std::collections::BTreeSet;

use crate::error::{MatrixError, MatrixResult};
use crate::geometry::ShardGeometry;

/// Canonical representative of `coord`'s mirror pair
///
/// Only the first and last components are compared, which is the whole
/// story for the rank-2 geometries [`check_geometry`] admits.
pub fn canonical(coord: &[usize]) -> Vec<usize> {
    match (coord.first(), coord.last()) {
        (Some(first), Some(last)) if first > last => coord.to_vec(),
        _ => coord.iter().rev().copied().collect(),
    }
}

/// Whether `coord` is its own canonical representative
pub fn is_canonical(coord: &[usize]) -> bool {
    canonical(coord) == coord
}

/// Deduplicated canonical coordinates of a geometry, ascending
pub fn canonical_coordinates(geometry: &ShardGeometry) -> Vec<Vec<usize>> {
    geometry
        .all_shard_coordinates()
        .iter()
        .map(|coord| canonical(coord))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Reject geometries whose mirror shards would not line up
pub fn check_geometry(geometry: &ShardGeometry) -> MatrixResult<()> {
    let shape = geometry.shape();
    let shard_sizes = geometry.shard_sizes();
    if geometry.rank() != 2 || shape[0] != shape[1] || shard_sizes[0] != shard_sizes[1] {
        return Err(MatrixError::UnsupportedSymmetricShape {
            shape: shape.to_vec(),
            shard_sizes: shard_sizes.to_vec(),
        });
    }
    Ok(())
}
