//! Shard geometry
//!
//! Pure arithmetic over a matrix shape and its shard sizes. Each axis is
//! split into half-open [`RealRange`]s of `shard_size` elements; the last
//! range of an axis is clipped to the axis length. A shard coordinate is
//! the position of a range in each axis list, and the coordinate space is
//! the cross product of those lists.
//!
//! ```text
//! shape (5, 4), shard sizes (2, 2)
//!
//!   axis 0: [0,2) [2,4) [4,5)      -> 3 shards
//!   axis 1: [0,2) [2,4)            -> 2 shards
//!
//!   coordinates: (0,0) (0,1) (1,0) (1,1) (2,0) (2,1)
//! ```

use std::fmt;

use crate::error::{MatrixError, MatrixResult};

/// Half-open index interval of one shard on one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RealRange {
    /// First index covered
    pub start: usize,
    /// One past the last index covered
    pub end: usize,
}

impl RealRange {
    /// Create a range
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of indices covered
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the range covers nothing
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for RealRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Shape and shard sizes of a matrix, validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardGeometry {
    shape: Vec<usize>,
    shard_sizes: Vec<usize>,
}

impl ShardGeometry {
    /// Validate and build a geometry
    ///
    /// Shape and shard sizes must have the same non-zero length and only
    /// positive entries.
    pub fn new(shape: Vec<usize>, shard_sizes: Vec<usize>) -> MatrixResult<Self> {
        if shape.len() != shard_sizes.len() {
            return Err(MatrixError::ShapeMismatch {
                context: "shard_sizes must have one entry per axis of shape",
                expected: shape.len(),
                actual: shard_sizes.len(),
            });
        }
        if shape.is_empty() {
            return Err(MatrixError::InvalidGeometry(
                "a matrix needs at least one axis".to_string(),
            ));
        }
        if shape.contains(&0) {
            return Err(MatrixError::InvalidGeometry(format!(
                "shape entries must be positive, got {shape:?}"
            )));
        }
        if shard_sizes.contains(&0) {
            return Err(MatrixError::InvalidGeometry(format!(
                "shard sizes must be positive, got {shard_sizes:?}"
            )));
        }
        Ok(Self { shape, shard_sizes })
    }

    /// Logical shape
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Declared shard size per axis
    pub fn shard_sizes(&self) -> &[usize] {
        &self.shard_sizes
    }

    /// Number of axes
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Geometry with every axis reversed (the transpose)
    pub fn reversed(&self) -> Self {
        Self {
            shape: self.shape.iter().rev().copied().collect(),
            shard_sizes: self.shard_sizes.iter().rev().copied().collect(),
        }
    }

    /// Ordered ranges covering `[0, shape[axis])`
    pub fn ranges(&self, axis: usize) -> MatrixResult<Vec<RealRange>> {
        self.check_axis(axis)?;
        Ok(axis_ranges(self.shape[axis], self.shard_sizes[axis]))
    }

    /// Number of shards along `axis`
    pub fn num_shards(&self, axis: usize) -> MatrixResult<usize> {
        self.check_axis(axis)?;
        Ok(self.shape[axis].div_ceil(self.shard_sizes[axis]))
    }

    /// Number of shards along every axis
    pub fn grid(&self) -> Vec<usize> {
        self.shape
            .iter()
            .zip(&self.shard_sizes)
            .map(|(&len, &size)| len.div_ceil(size))
            .collect()
    }

    /// Total number of shards
    pub fn shard_count(&self) -> usize {
        self.grid().iter().product()
    }

    /// Every shard coordinate, axis-major lexicographic
    pub fn all_shard_coordinates(&self) -> Vec<Vec<usize>> {
        let grid = self.grid();
        let total: usize = grid.iter().product();
        let mut coords = Vec::with_capacity(total);
        let mut current = vec![0usize; grid.len()];

        for _ in 0..total {
            coords.push(current.clone());

            // Odometer increment, last axis fastest.
            for axis in (0..grid.len()).rev() {
                current[axis] += 1;
                if current[axis] < grid[axis] {
                    break;
                }
                current[axis] = 0;
            }
        }

        coords
    }

    /// Real ranges of every shard, in coordinate order
    pub fn all_real_ranges(&self) -> Vec<Vec<RealRange>> {
        self.all_shard_coordinates()
            .iter()
            .map(|coord| self.ranges_unchecked(coord))
            .collect()
    }

    /// Check the arity and bounds of a coordinate
    pub fn check_coordinate(&self, coord: &[usize]) -> MatrixResult<()> {
        if coord.len() != self.rank() {
            return Err(MatrixError::ShapeMismatch {
                context: "block coordinate does not match matrix rank",
                expected: self.rank(),
                actual: coord.len(),
            });
        }
        let grid = self.grid();
        if coord.iter().zip(&grid).any(|(&c, &n)| c >= n) {
            return Err(MatrixError::CoordinateOutOfBounds {
                coord: coord.to_vec(),
                grid,
            });
        }
        Ok(())
    }

    /// Real ranges of the shard at `coord`
    pub fn real_ranges(&self, coord: &[usize]) -> MatrixResult<Vec<RealRange>> {
        self.check_coordinate(coord)?;
        Ok(self.ranges_unchecked(coord))
    }

    /// Array shape of the shard at `coord`
    pub fn block_shape(&self, coord: &[usize]) -> MatrixResult<Vec<usize>> {
        Ok(self
            .real_ranges(coord)?
            .iter()
            .map(RealRange::len)
            .collect())
    }

    /// Coordinate whose real ranges and shard sizes are exactly these
    ///
    /// Returns `None` for anything that is not a shard of this geometry:
    /// wrong arity, foreign shard sizes, misaligned or clipped-wrong ranges.
    pub fn coordinate_of(&self, ranges: &[RealRange], shard_sizes: &[usize]) -> Option<Vec<usize>> {
        if ranges.len() != self.rank() || shard_sizes != self.shard_sizes.as_slice() {
            return None;
        }

        let coord: Vec<usize> = ranges
            .iter()
            .zip(&self.shard_sizes)
            .map(|(range, &size)| range.start / size)
            .collect();

        match self.real_ranges(&coord) {
            Ok(expected) if expected == ranges => Some(coord),
            _ => None,
        }
    }

    fn ranges_unchecked(&self, coord: &[usize]) -> Vec<RealRange> {
        coord
            .iter()
            .zip(self.shape.iter().zip(&self.shard_sizes))
            .map(|(&c, (&len, &size))| {
                let start = c * size;
                RealRange::new(start, (start + size).min(len))
            })
            .collect()
    }

    fn check_axis(&self, axis: usize) -> MatrixResult<()> {
        if axis >= self.rank() {
            return Err(MatrixError::InvalidAxis {
                axis,
                rank: self.rank(),
            });
        }
        Ok(())
    }
}

/// Step through an axis in `size` increments, clipping the tail
fn axis_ranges(len: usize, size: usize) -> Vec<RealRange> {
    let mut ranges: Vec<RealRange> = (0..len)
        .step_by(size)
        .map(|start| RealRange::new(start, start + size))
        .collect();

    if ranges.last().is_some_and(|last| last.end > len) {
        ranges.pop();
    }

    let covered = ranges.last().map_or(0, |last| last.end);
    if covered < len {
        ranges.push(RealRange::new(covered, len));
    }

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_even_split() {
        let geometry = ShardGeometry::new(vec![4, 4], vec![2, 2]).unwrap();
        assert_eq!(
            geometry.ranges(0).unwrap(),
            vec![RealRange::new(0, 2), RealRange::new(2, 4)]
        );
        assert_eq!(
            geometry.all_shard_coordinates(),
            vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]
        );
        assert_eq!(geometry.shard_count(), 4);
    }

    #[test]
    fn test_trailing_range_clipped() {
        let geometry = ShardGeometry::new(vec![5, 3], vec![2, 4]).unwrap();
        assert_eq!(
            geometry.ranges(0).unwrap(),
            vec![RealRange::new(0, 2), RealRange::new(2, 4), RealRange::new(4, 5)]
        );
        // Axis shorter than a shard is one short range.
        assert_eq!(geometry.ranges(1).unwrap(), vec![RealRange::new(0, 3)]);
        assert_eq!(geometry.grid(), vec![3, 1]);
        assert_eq!(geometry.block_shape(&[2, 0]).unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_invalid_axis() {
        let geometry = ShardGeometry::new(vec![4, 4], vec![2, 2]).unwrap();
        assert!(matches!(
            geometry.ranges(2),
            Err(MatrixError::InvalidAxis { axis: 2, rank: 2 })
        ));
        assert!(geometry.num_shards(7).is_err());
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(matches!(
            ShardGeometry::new(vec![4, 4], vec![2]),
            Err(MatrixError::ShapeMismatch { expected: 2, actual: 1, .. })
        ));
        assert!(matches!(
            ShardGeometry::new(vec![], vec![]),
            Err(MatrixError::InvalidGeometry(_))
        ));
        assert!(ShardGeometry::new(vec![4, 0], vec![2, 2]).is_err());
        assert!(ShardGeometry::new(vec![4, 4], vec![0, 2]).is_err());
    }

    #[test]
    fn test_coordinate_checks() {
        let geometry = ShardGeometry::new(vec![4, 6], vec![2, 4]).unwrap();
        assert!(matches!(
            geometry.check_coordinate(&[0]),
            Err(MatrixError::ShapeMismatch { expected: 2, actual: 1, .. })
        ));
        assert!(matches!(
            geometry.check_coordinate(&[0, 2]),
            Err(MatrixError::CoordinateOutOfBounds { .. })
        ));
        assert_eq!(
            geometry.real_ranges(&[1, 1]).unwrap(),
            vec![RealRange::new(2, 4), RealRange::new(4, 6)]
        );
    }

    #[test]
    fn test_coordinate_of() {
        let geometry = ShardGeometry::new(vec![5, 5], vec![2, 2]).unwrap();
        let ranges = vec![RealRange::new(4, 5), RealRange::new(2, 4)];
        assert_eq!(geometry.coordinate_of(&ranges, &[2, 2]), Some(vec![2, 1]));

        // Unclipped tail, foreign shard size, misaligned start.
        assert_eq!(
            geometry.coordinate_of(&[RealRange::new(4, 6), RealRange::new(0, 2)], &[2, 2]),
            None
        );
        assert_eq!(geometry.coordinate_of(&ranges, &[3, 2]), None);
        assert_eq!(
            geometry.coordinate_of(&[RealRange::new(1, 3), RealRange::new(0, 2)], &[2, 2]),
            None
        );
    }

    #[test]
    fn test_reversed() {
        let geometry = ShardGeometry::new(vec![6, 4], vec![3, 2]).unwrap();
        let transposed = geometry.reversed();
        assert_eq!(transposed.shape(), &[4, 6]);
        assert_eq!(transposed.shard_sizes(), &[2, 3]);
        assert_eq!(transposed.reversed(), geometry);
    }

    proptest! {
        /// Property: ranges tile each axis exactly, only the last may be short
        #[test]
        fn ranges_cover_axis(len in 1usize..500, size in 1usize..64) {
            let geometry = ShardGeometry::new(vec![len], vec![size]).unwrap();
            let ranges = geometry.ranges(0).unwrap();

            prop_assert_eq!(ranges.first().unwrap().start, 0);
            prop_assert_eq!(ranges.last().unwrap().end, len);
            for pair in ranges.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
                prop_assert_eq!(pair[0].len(), size);
            }
            prop_assert!(ranges.last().unwrap().len() <= size);
            prop_assert!(!ranges.last().unwrap().is_empty());
            prop_assert_eq!(ranges.len(), geometry.num_shards(0).unwrap());
        }

        /// Property: coordinate ranges agree with the per-axis lists
        #[test]
        fn coordinates_match_axis_ranges(
            rows in 1usize..40,
            cols in 1usize..40,
            row_size in 1usize..9,
            col_size in 1usize..9,
        ) {
            let geometry = ShardGeometry::new(vec![rows, cols], vec![row_size, col_size]).unwrap();
            let row_ranges = geometry.ranges(0).unwrap();
            let col_ranges = geometry.ranges(1).unwrap();
            let coords = geometry.all_shard_coordinates();

            prop_assert_eq!(coords.len(), row_ranges.len() * col_ranges.len());
            for coord in &coords {
                let ranges = geometry.real_ranges(coord).unwrap();
                prop_assert_eq!(ranges[0], row_ranges[coord[0]]);
                prop_assert_eq!(ranges[1], col_ranges[coord[1]]);
                prop_assert_eq!(
                    geometry.coordinate_of(&ranges, geometry.shard_sizes()),
                    Some(coord.clone())
                );
            }
        }
    }
}
