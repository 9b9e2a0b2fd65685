//! Shard-addressable matrix
//!
//! A [`BigMatrix`] is a cheap, immutable view: a shared base (name,
//! geometry in stored orientation, key codec, store handle, shard
//! computer) plus an [`Orientation`]. Every shard operation funnels
//! through one resolver that maps the caller's coordinate to the stored
//! coordinate, its object key and whether the block must be transposed.
//!
//! ```text
//!   caller coord ──► Orientation::resolve ──► (stored coord, flip)
//!                                                  │
//!                       KeyCodec::encode ◄─────────┘
//!                              │
//!        get: fetch / compute ─┴─ transpose if flip ──► caller block
//!        put: caller block ── transpose if flip ──► store
//! ```
//!
//! Shards are always stored in base orientation, so a transposed view and
//! its base read and write the very same objects.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use ndarray::{ArrayBase, ArrayD, Data, Dimension};
use tracing::{debug, info, trace};

use shardmat_store::{ObjectKey, ObjectStore};

use crate::codec;
use crate::compute::ShardComputer;
use crate::config::{MatrixConfig, ReadConfig};
use crate::dtype::{Dtype, Element};
use crate::error::{MatrixError, MatrixResult};
use crate::geometry::{RealRange, ShardGeometry};
use crate::header::MatrixHeader;
use crate::key::KeyCodec;
use crate::retry::read_with_retry;
use crate::symmetric;

/// How a view maps onto stored shards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Coordinates and blocks as stored
    Plain,
    /// Reversed coordinates, transposed blocks
    Transposed,
    /// One stored shard per mirror pair, under the canonical coordinate
    Symmetric,
}

impl Orientation {
    /// Stored coordinate for `coord`, and whether blocks must be transposed
    pub fn resolve(self, coord: &[usize]) -> (Vec<usize>, bool) {
        match self {
            Orientation::Plain => (coord.to_vec(), false),
            Orientation::Transposed => (coord.iter().rev().copied().collect(), true),
            Orientation::Symmetric => {
                let canonical = symmetric::canonical(coord);
                let flip = canonical != coord;
                (canonical, flip)
            }
        }
    }

    /// Coordinate under which this view reports a stored shard
    ///
    /// Symmetric views only read canonical keys, so a mirror key (written
    /// through a plain view) is not one of their shards.
    fn present(self, stored: Vec<usize>) -> Option<Vec<usize>> {
        match self {
            Orientation::Plain => Some(stored),
            Orientation::Transposed => Some(stored.into_iter().rev().collect()),
            Orientation::Symmetric => symmetric::is_canonical(&stored).then_some(stored),
        }
    }

    /// Orientation of the transpose
    fn transposed(self) -> Self {
        match self {
            Orientation::Plain => Orientation::Transposed,
            Orientation::Transposed => Orientation::Plain,
            Orientation::Symmetric => Orientation::Symmetric,
        }
    }
}

/// State shared by a matrix and all of its views
struct MatrixBase<T: Element> {
    name: String,
    bucket: String,
    prefix: String,
    /// Stored orientation
    geometry: ShardGeometry,
    /// `geometry.reversed()`, served to transposed views
    transposed: ShardGeometry,
    codec: KeyCodec,
    store: Arc<dyn ObjectStore>,
    read: ReadConfig,
    materialize_workers: usize,
    computer: Option<Arc<dyn ShardComputer<T>>>,
}

impl<T: Element> Clone for MatrixBase<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
            geometry: self.geometry.clone(),
            transposed: self.transposed.clone(),
            codec: self.codec.clone(),
            store: Arc::clone(&self.store),
            read: self.read,
            materialize_workers: self.materialize_workers,
            computer: self.computer.clone(),
        }
    }
}

/// A shard resolved to storage
#[derive(Debug)]
struct Resolved {
    stored: Vec<usize>,
    flip: bool,
    key: ObjectKey,
}

/// Dense matrix persisted as independently stored shards
///
/// Cloning is cheap and clones share everything; see [`BigMatrix::transpose`]
/// for views.
pub struct BigMatrix<T: Element = f64> {
    base: Arc<MatrixBase<T>>,
    orientation: Orientation,
}

impl<T: Element> Clone for BigMatrix<T> {
    fn clone(&self) -> Self {
        Self {
            base: Arc::clone(&self.base),
            orientation: self.orientation,
        }
    }
}

impl<T: Element> BigMatrix<T> {
    /// Start building a matrix named `name` in `store`
    pub fn builder(store: Arc<dyn ObjectStore>, name: impl Into<String>) -> MatrixBuilder<T> {
        MatrixBuilder::new(store, name.into())
    }

    /// Reopen an existing matrix from its persisted header
    pub async fn open(
        store: Arc<dyn ObjectStore>,
        name: impl Into<String>,
        config: MatrixConfig,
    ) -> MatrixResult<Self> {
        Self::builder(store, name).config(config).open().await
    }

    pub(crate) fn from_parts(
        store: Arc<dyn ObjectStore>,
        name: &str,
        config: &MatrixConfig,
        geometry: ShardGeometry,
        orientation: Orientation,
        computer: Option<Arc<dyn ShardComputer<T>>>,
    ) -> MatrixResult<Self> {
        config.validate()?;
        if orientation == Orientation::Symmetric {
            symmetric::check_geometry(&geometry)?;
        }

        let codec = KeyCodec::new(&config.prefix, name);
        // Surfaces an unusable bucket or name now rather than on first I/O.
        ObjectKey::new(&config.bucket, codec.header_key())?;

        let base = MatrixBase {
            name: name.to_string(),
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
            transposed: geometry.reversed(),
            geometry,
            codec,
            store,
            read: config.read,
            materialize_workers: config.materialize_workers,
            computer,
        };

        Ok(Self {
            base: Arc::new(base),
            orientation,
        })
    }

    /// Matrix name (its key under the prefix)
    pub fn name(&self) -> &str {
        &self.base.name
    }

    /// Bucket holding the matrix objects
    pub fn bucket(&self) -> &str {
        &self.base.bucket
    }

    /// Key prefix
    pub fn prefix(&self) -> &str {
        &self.base.prefix
    }

    /// Orientation of this view
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Whether this is a transposed view
    pub fn is_transposed(&self) -> bool {
        self.orientation == Orientation::Transposed
    }

    /// Whether mirror shards are folded onto canonical coordinates
    pub fn is_symmetric(&self) -> bool {
        self.orientation == Orientation::Symmetric
    }

    /// Element type
    pub fn dtype(&self) -> Dtype {
        T::DTYPE
    }

    /// Geometry as seen through this view
    pub fn geometry(&self) -> &ShardGeometry {
        match self.orientation {
            Orientation::Transposed => &self.base.transposed,
            Orientation::Plain | Orientation::Symmetric => &self.base.geometry,
        }
    }

    /// Geometry in stored orientation
    pub fn stored_geometry(&self) -> &ShardGeometry {
        &self.base.geometry
    }

    /// Logical shape
    pub fn shape(&self) -> &[usize] {
        self.geometry().shape()
    }

    /// Logical shard sizes
    pub fn shard_sizes(&self) -> &[usize] {
        self.geometry().shard_sizes()
    }

    /// Object store handle
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.base.store
    }

    /// Whether a shard computer is registered
    pub fn has_shard_computer(&self) -> bool {
        self.base.computer.is_some()
    }

    pub(crate) fn materialize_workers(&self) -> usize {
        self.base.materialize_workers
    }

    /// View with axes reversed; symmetric matrices are their own transpose
    pub fn transpose(&self) -> Self {
        Self {
            base: Arc::clone(&self.base),
            orientation: self.orientation.transposed(),
        }
    }

    /// Same matrix with `computer` as the fallback for missing blocks
    pub fn with_shard_computer(self, computer: impl ShardComputer<T> + 'static) -> Self {
        let mut base = (*self.base).clone();
        base.computer = Some(Arc::new(computer));
        Self {
            base: Arc::new(base),
            orientation: self.orientation,
        }
    }

    /// Key of the header object
    pub fn header_key(&self) -> MatrixResult<ObjectKey> {
        Ok(ObjectKey::new(&self.base.bucket, self.base.codec.header_key())?)
    }

    /// Persist the header so the matrix can be reopened by name
    pub async fn write_header(&self) -> MatrixResult<()> {
        MatrixHeader::new(&self.base.geometry, T::DTYPE)
            .write(self.base.store.as_ref(), &self.header_key()?)
            .await
    }

    /// Object key backing the block at `coord`
    pub fn shard_key(&self, coord: &[usize]) -> MatrixResult<ObjectKey> {
        Ok(self.resolve(coord)?.key)
    }

    fn resolve(&self, coord: &[usize]) -> MatrixResult<Resolved> {
        self.geometry().check_coordinate(coord)?;
        let (stored, flip) = self.orientation.resolve(coord);
        let ranges = self.base.geometry.real_ranges(&stored)?;
        let key = ObjectKey::new(
            &self.base.bucket,
            self.base
                .codec
                .encode(&ranges, self.base.geometry.shard_sizes()),
        )?;
        Ok(Resolved { stored, flip, key })
    }

    /// This matrix in stored orientation, as handed to shard computers
    fn stored_view(&self) -> Self {
        match self.orientation {
            Orientation::Transposed => self.transpose(),
            Orientation::Plain | Orientation::Symmetric => self.clone(),
        }
    }

    /// Whether the block at `coord` is persisted
    pub async fn block_exists(&self, coord: &[usize]) -> MatrixResult<bool> {
        let resolved = self.resolve(coord)?;
        let target = resolved.key.to_string();
        read_with_retry(&self.base.read, &target, || {
            self.base.store.exists(&resolved.key)
        })
        .await
    }

    /// Fetch the block at `coord`
    ///
    /// A missing block is computed by the registered [`ShardComputer`]
    /// (and not persisted); without one the call fails with
    /// [`MatrixError::BlockMissing`].
    pub async fn get_block(&self, coord: &[usize]) -> MatrixResult<ArrayD<T>> {
        let resolved = self.resolve(coord)?;
        let key = &resolved.key;
        let expected = self.base.geometry.block_shape(&resolved.stored)?;

        let target = key.to_string();
        let read = &self.base.read;

        let exists = read_with_retry(read, &target, || self.base.store.exists(key)).await?;
        let fetched = if exists {
            match read_with_retry(read, &target, || self.base.store.get(key)).await {
                Ok(data) => Some(data),
                Err(MatrixError::Store(e)) if e.is_not_found() => {
                    debug!(key = %key, "Block deleted between existence check and fetch");
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let block = if let Some(data) = fetched {
            debug!(key = %key, size = data.len(), "Fetched block");
            codec::decode::<T>(&data)?
        } else if let Some(computer) = &self.base.computer {
            debug!(matrix = %self, coord = ?resolved.stored, "Block missing, computing");
            computer.compute(&self.stored_view(), &resolved.stored)?
        } else {
            return Err(MatrixError::BlockMissing {
                coord: coord.to_vec(),
                key: key.to_string(),
            });
        };

        check_block_shape(&resolved.stored, &expected, block.shape())?;

        Ok(if resolved.flip {
            block.reversed_axes()
        } else {
            block
        })
    }

    /// Store `block` at `coord`, replacing any previous block
    pub async fn put_block<S, D>(&self, block: &ArrayBase<S, D>, coord: &[usize]) -> MatrixResult<()>
    where
        S: Data<Elem = T>,
        D: Dimension,
    {
        let resolved = self.resolve(coord)?;
        let expected = self.geometry().block_shape(coord)?;
        check_block_shape(coord, &expected, block.shape())?;

        let data = {
            let view = block.view().into_dyn();
            if resolved.flip {
                codec::encode(&view.reversed_axes())
            } else {
                codec::encode(&view)
            }
        };

        let size = data.len();
        self.base.store.put(&resolved.key, data).await?;
        debug!(key = %resolved.key, size, "Stored block");
        Ok(())
    }

    /// Remove the block at `coord`; absent blocks are not an error
    pub async fn delete_block(&self, coord: &[usize]) -> MatrixResult<()> {
        let resolved = self.resolve(coord)?;
        self.base.store.delete(&resolved.key).await?;
        debug!(key = %resolved.key, "Deleted block");
        Ok(())
    }

    /// Every addressable coordinate; canonical ones only when symmetric
    pub fn block_coordinates(&self) -> Vec<Vec<usize>> {
        match self.orientation {
            Orientation::Symmetric => symmetric::canonical_coordinates(&self.base.geometry),
            Orientation::Plain | Orientation::Transposed => {
                self.geometry().all_shard_coordinates()
            }
        }
    }

    /// Coordinates of persisted blocks, discovered by listing the namespace
    pub async fn existing_block_coordinates(&self) -> MatrixResult<Vec<Vec<usize>>> {
        let root = self.base.codec.root();
        let target = format!("{}/{root}", self.base.bucket);
        let keys = read_with_retry(&self.base.read, &target, || {
            self.base.store.list(&self.base.bucket, root)
        })
        .await?;

        let mut found = BTreeSet::new();
        for key in &keys {
            let Some(decoded) = self.base.codec.decode(key) else {
                continue;
            };
            match self
                .base
                .geometry
                .coordinate_of(&decoded.ranges, &decoded.shard_sizes)
            {
                Some(stored) => match self.orientation.present(stored) {
                    Some(coord) => {
                        found.insert(coord);
                    }
                    None => trace!(key = key.as_str(), "Mirror key is not a canonical shard"),
                },
                None => trace!(key = key.as_str(), "Key does not address a shard of this geometry"),
            }
        }

        Ok(found.into_iter().collect())
    }

    /// Coordinates with no persisted block
    pub async fn missing_block_coordinates(&self) -> MatrixResult<Vec<Vec<usize>>> {
        let existing: BTreeSet<Vec<usize>> =
            self.existing_block_coordinates().await?.into_iter().collect();
        Ok(self
            .block_coordinates()
            .into_iter()
            .filter(|coord| !existing.contains(coord))
            .collect())
    }

    /// Real ranges of the persisted blocks
    pub async fn existing_blocks(&self) -> MatrixResult<Vec<Vec<RealRange>>> {
        self.existing_block_coordinates()
            .await?
            .iter()
            .map(|coord| self.geometry().real_ranges(coord))
            .collect()
    }

    /// Delete every persisted block, returning how many were removed
    ///
    /// Not atomic: a failure can leave some blocks deleted. Calling again
    /// finishes the job.
    pub async fn free(&self) -> MatrixResult<usize> {
        let existing = self.existing_block_coordinates().await?;
        for coord in &existing {
            self.delete_block(coord).await?;
        }
        info!(matrix = %self, deleted = existing.len(), "Freed blocks");
        Ok(existing.len())
    }

    /// [`free`](Self::free) the blocks, then remove the header
    pub async fn delete(&self) -> MatrixResult<()> {
        self.free().await?;
        let header_key = self.header_key()?;
        self.base.store.delete(&header_key).await?;
        info!(matrix = %self, "Deleted matrix");
        Ok(())
    }
}

fn check_block_shape(coord: &[usize], expected: &[usize], actual: &[usize]) -> MatrixResult<()> {
    if expected != actual {
        return Err(MatrixError::IncompatibleBlockShape {
            coord: coord.to_vec(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}

impl<T: Element> fmt::Display for BigMatrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.orientation {
            Orientation::Plain => write!(f, "BigMatrix({})", self.base.name),
            Orientation::Transposed => write!(f, "BigMatrix({}).T", self.base.name),
            Orientation::Symmetric => write!(f, "BigSymmetricMatrix({})", self.base.name),
        }
    }
}

impl<T: Element> fmt::Debug for BigMatrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigMatrix")
            .field("name", &self.base.name)
            .field("bucket", &self.base.bucket)
            .field("prefix", &self.base.prefix)
            .field("shape", &self.shape())
            .field("shard_sizes", &self.shard_sizes())
            .field("dtype", &T::DTYPE)
            .field("orientation", &self.orientation)
            .field("shard_computer", &self.has_shard_computer())
            .finish()
    }
}

/// Builder for [`BigMatrix`]
///
/// With an explicit shape the matrix is declared (and optionally its header
/// written); without one, the geometry is read from the persisted header.
pub struct MatrixBuilder<T: Element> {
    store: Arc<dyn ObjectStore>,
    name: String,
    config: MatrixConfig,
    shape: Option<Vec<usize>>,
    shard_sizes: Vec<usize>,
    symmetric: bool,
    write_header: bool,
    computer: Option<Arc<dyn ShardComputer<T>>>,
}

impl<T: Element> MatrixBuilder<T> {
    fn new(store: Arc<dyn ObjectStore>, name: String) -> Self {
        Self {
            store,
            name,
            config: MatrixConfig::default(),
            shape: None,
            shard_sizes: Vec::new(),
            symmetric: false,
            write_header: false,
            computer: None,
        }
    }

    /// Storage configuration
    pub fn config(mut self, config: MatrixConfig) -> Self {
        self.config = config;
        self
    }

    /// Declare the shape instead of reading it from the header
    pub fn shape(mut self, shape: impl Into<Vec<usize>>) -> Self {
        self.shape = Some(shape.into());
        self
    }

    /// Shard size per axis; required with [`shape`](Self::shape)
    pub fn shard_sizes(mut self, shard_sizes: impl Into<Vec<usize>>) -> Self {
        self.shard_sizes = shard_sizes.into();
        self
    }

    /// Fold mirror shards onto canonical coordinates
    pub fn symmetric(mut self, symmetric: bool) -> Self {
        self.symmetric = symmetric;
        self
    }

    /// Persist the header on open
    pub fn write_header(mut self, write_header: bool) -> Self {
        self.write_header = write_header;
        self
    }

    /// Fallback for blocks missing from storage
    pub fn shard_computer(mut self, computer: impl ShardComputer<T> + 'static) -> Self {
        self.computer = Some(Arc::new(computer));
        self
    }

    /// Resolve the geometry and build the matrix
    pub async fn open(self) -> MatrixResult<BigMatrix<T>> {
        self.config.validate()?;

        let geometry = match self.shape {
            Some(shape) => ShardGeometry::new(shape, self.shard_sizes)?,
            None => {
                let codec = KeyCodec::new(&self.config.prefix, &self.name);
                let header_key = ObjectKey::new(&self.config.bucket, codec.header_key())?;
                let header = MatrixHeader::read(self.store.as_ref(), &header_key, &self.config.read)
                    .await?
                    .ok_or_else(|| MatrixError::HeaderMissing(self.name.clone()))?;
                if header.dtype != T::DTYPE {
                    return Err(MatrixError::InvalidDtype {
                        expected: T::DTYPE,
                        actual: header.dtype,
                    });
                }
                header.geometry()?
            }
        };

        let orientation = if self.symmetric {
            Orientation::Symmetric
        } else {
            Orientation::Plain
        };
        let matrix = BigMatrix::from_parts(
            self.store,
            &self.name,
            &self.config,
            geometry,
            orientation,
            self.computer,
        )?;

        if self.write_header {
            matrix.write_header().await?;
        }
        debug!(matrix = %matrix, shape = ?matrix.shape(), "Opened matrix");
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array2};
    use shardmat_store::MemoryBackend;

    fn test_config() -> MatrixConfig {
        MatrixConfig::default().with_bucket("test-bucket")
    }

    async fn create_matrix(
        store: &Arc<MemoryBackend>,
        shape: &[usize],
        shard_sizes: &[usize],
    ) -> BigMatrix<f64> {
        BigMatrix::<f64>::builder(store.clone(), "m")
            .config(test_config())
            .shape(shape)
            .shard_sizes(shard_sizes)
            .write_header(true)
            .open()
            .await
            .unwrap()
    }

    fn block(rows: usize, cols: usize, seed: f64) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(i, j)| seed + (i * cols + j) as f64)
    }

    #[test]
    fn test_orientation_resolve() {
        assert_eq!(Orientation::Plain.resolve(&[0, 1]), (vec![0, 1], false));
        assert_eq!(Orientation::Transposed.resolve(&[0, 1]), (vec![1, 0], true));
        assert_eq!(Orientation::Symmetric.resolve(&[0, 1]), (vec![1, 0], true));
        assert_eq!(Orientation::Symmetric.resolve(&[1, 0]), (vec![1, 0], false));
        assert_eq!(Orientation::Symmetric.resolve(&[1, 1]), (vec![1, 1], false));
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = Arc::new(MemoryBackend::new());
        let matrix = create_matrix(&store, &[5, 4], &[2, 2]).await;

        let edge = block(1, 2, 10.0);
        matrix.put_block(&edge, &[2, 1]).await.unwrap();

        let fetched = matrix.get_block(&[2, 1]).await.unwrap();
        assert_eq!(fetched, edge.into_dyn());
        assert!(matrix.block_exists(&[2, 1]).await.unwrap());
        assert!(!matrix.block_exists(&[0, 0]).await.unwrap());
    }

    #[tokio::test]
    async fn test_key_layout() {
        let store = Arc::new(MemoryBackend::new());
        let matrix = create_matrix(&store, &[5, 4], &[2, 2]).await;

        let key = matrix.shard_key(&[2, 1]).unwrap();
        assert_eq!(key.bucket(), "test-bucket");
        assert_eq!(key.key(), "shardmat.objects/m/4_5_2_2_4_2_");
        assert_eq!(matrix.transpose().shard_key(&[1, 2]).unwrap(), key);
    }

    #[tokio::test]
    async fn test_block_shape_checked() {
        let store = Arc::new(MemoryBackend::new());
        let matrix = create_matrix(&store, &[5, 4], &[2, 2]).await;

        let err = matrix.put_block(&block(2, 2, 0.0), &[2, 0]).await.unwrap_err();
        assert!(matches!(
            err,
            MatrixError::IncompatibleBlockShape { ref expected, ref actual, .. }
                if expected == &vec![1, 2] && actual == &vec![2, 2]
        ));
    }

    #[tokio::test]
    async fn test_coordinate_arity_checked() {
        let store = Arc::new(MemoryBackend::new());
        let matrix = create_matrix(&store, &[4, 4], &[2, 2]).await;

        assert!(matches!(
            matrix.get_block(&[0]).await,
            Err(MatrixError::ShapeMismatch { expected: 2, actual: 1, .. })
        ));
        assert!(matches!(
            matrix.get_block(&[0, 5]).await,
            Err(MatrixError::CoordinateOutOfBounds { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_block_without_computer() {
        let store = Arc::new(MemoryBackend::new());
        let matrix = create_matrix(&store, &[4, 4], &[2, 2]).await;

        match matrix.get_block(&[1, 0]).await {
            Err(MatrixError::BlockMissing { coord, key }) => {
                assert_eq!(coord, vec![1, 0]);
                assert!(key.ends_with("2_4_2_0_2_2_"));
            }
            other => panic!("expected BlockMissing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transposed_view_aliases_base() {
        let store = Arc::new(MemoryBackend::new());
        let matrix = create_matrix(&store, &[6, 4], &[3, 2]).await;
        let view = matrix.transpose();

        assert_eq!(view.shape(), &[4, 6]);
        assert_eq!(view.shard_sizes(), &[2, 3]);
        assert!(view.is_transposed());
        assert_eq!(view.to_string(), "BigMatrix(m).T");
        assert!(!view.transpose().is_transposed());

        let a = block(3, 2, 1.0);
        matrix.put_block(&a, &[1, 0]).await.unwrap();
        let through_view = view.get_block(&[0, 1]).await.unwrap();
        assert_eq!(through_view, a.t().to_owned().into_dyn());

        // Writing through the view lands in base orientation.
        let b = block(2, 3, 100.0);
        view.put_block(&b, &[1, 1]).await.unwrap();
        assert_eq!(
            matrix.get_block(&[1, 1]).await.unwrap(),
            b.t().to_owned().into_dyn()
        );
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_existing_and_missing() {
        let store = Arc::new(MemoryBackend::new());
        let matrix = create_matrix(&store, &[4, 6], &[2, 2]).await;

        matrix.put_block(&block(2, 2, 0.0), &[0, 2]).await.unwrap();
        matrix.put_block(&block(2, 2, 0.0), &[1, 0]).await.unwrap();

        assert_eq!(
            matrix.existing_block_coordinates().await.unwrap(),
            vec![vec![0, 2], vec![1, 0]]
        );
        assert_eq!(
            matrix.transpose().existing_block_coordinates().await.unwrap(),
            vec![vec![0, 1], vec![2, 0]]
        );
        assert_eq!(matrix.missing_block_coordinates().await.unwrap().len(), 4);
        assert_eq!(
            matrix.existing_blocks().await.unwrap()[0],
            vec![RealRange::new(0, 2), RealRange::new(4, 6)]
        );
    }

    #[tokio::test]
    async fn test_foreign_keys_ignored() {
        let store = Arc::new(MemoryBackend::new());
        let matrix = create_matrix(&store, &[4, 4], &[2, 2]).await;
        matrix.put_block(&block(2, 2, 0.0), &[0, 0]).await.unwrap();

        for stray in [
            "shardmat.objects/m/notes.txt",
            "shardmat.objects/m/0_2_3_0_2_3_",
            "shardmat.objects/m/0_2_2_",
            "shardmat.objects/mm/2_4_2_2_4_2_",
        ] {
            let key = ObjectKey::new("test-bucket", stray).unwrap();
            store.put(&key, bytes::Bytes::new()).await.unwrap();
        }

        assert_eq!(
            matrix.existing_block_coordinates().await.unwrap(),
            vec![vec![0, 0]]
        );
    }

    #[tokio::test]
    async fn test_reopen_from_header() {
        let store = Arc::new(MemoryBackend::new());
        create_matrix(&store, &[5, 3], &[2, 2]).await;

        let reopened = BigMatrix::<f64>::open(store.clone(), "m", test_config())
            .await
            .unwrap();
        assert_eq!(reopened.shape(), &[5, 3]);
        assert_eq!(reopened.shard_sizes(), &[2, 2]);

        let wrong_type = BigMatrix::<i32>::open(store.clone(), "m", test_config()).await;
        assert!(matches!(
            wrong_type,
            Err(MatrixError::InvalidDtype {
                expected: Dtype::Int32,
                actual: Dtype::Float64
            })
        ));

        let absent = BigMatrix::<f64>::open(store.clone(), "nope", test_config()).await;
        assert!(matches!(absent, Err(MatrixError::HeaderMissing(name)) if name == "nope"));
    }

    #[tokio::test]
    async fn test_shard_sizes_required() {
        let store = Arc::new(MemoryBackend::new());
        let result = BigMatrix::<f64>::builder(store, "m")
            .config(test_config())
            .shape([4, 4])
            .open()
            .await;
        assert!(matches!(
            result,
            Err(MatrixError::ShapeMismatch { expected: 2, actual: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = Arc::new(MemoryBackend::new());
        let matrix = create_matrix(&store, &[2, 2], &[1, 1]).await;

        matrix.delete_block(&[0, 0]).await.unwrap();
        assert_eq!(matrix.free().await.unwrap(), 0);
        matrix.delete().await.unwrap();
        matrix.delete().await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_shard_computer_receives_stored_orientation() {
        let store = Arc::new(MemoryBackend::new());
        let matrix = create_matrix(&store, &[4, 2], &[2, 2]).await.with_shard_computer(
            |m: &BigMatrix<f64>, coord: &[usize]| -> MatrixResult<ArrayD<f64>> {
                assert!(!m.is_transposed());
                let shape = m.geometry().block_shape(coord)?;
                Ok(ArrayD::from_shape_fn(ndarray::IxDyn(&shape), |idx| {
                    (coord[0] * 10 + idx[0] * 2 + idx[1]) as f64
                }))
            },
        );

        let base = matrix.get_block(&[1, 0]).await.unwrap();
        assert_eq!(base, arr2(&[[10.0, 11.0], [12.0, 13.0]]).into_dyn());

        let view = matrix.transpose().get_block(&[0, 1]).await.unwrap();
        assert_eq!(view, arr2(&[[10.0, 12.0], [11.0, 13.0]]).into_dyn());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_display() {
        let store = Arc::new(MemoryBackend::new());
        let matrix = create_matrix(&store, &[2, 2], &[1, 1]).await;
        assert_eq!(matrix.to_string(), "BigMatrix(m)");
        assert!(format!("{matrix:?}").contains("Plain"));
    }
}
