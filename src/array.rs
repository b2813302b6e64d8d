//! Description of lazily chunked n-dimensional datasets.
//!
//! A benchmark run fetches every chunk of one dataset. The dataset is never
//! materialised locally; this module only models its geometry: shape, chunk
//! shape and element type, and the derived per-chunk object keys and byte
//! counts. The layout is one object per chunk, keyed by the dotted chunk
//! index, as used by chunked array formats such as Zarr.

use crate::error::FetchBenchError;
use crate::types::DType;

/// A lazily chunked n-dimensional dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkedDataset {
    /// Shape of the dataset.
    shape: Vec<usize>,
    /// Shape of one (non-edge) chunk.
    chunk_shape: Vec<usize>,
    /// Element data type.
    dtype: DType,
}

/// One chunk of a [ChunkedDataset].
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkSpec {
    /// Position of the chunk in the chunk grid.
    pub index: Vec<usize>,
    /// Object key of the chunk within the data source.
    pub key: String,
    /// Size of the chunk in bytes, accounting for edge clipping.
    pub nbytes: usize,
}

impl ChunkedDataset {
    /// Returns a new ChunkedDataset.
    ///
    /// # Arguments
    ///
    /// * `shape`: Shape of the dataset
    /// * `chunk_shape`: Shape of one chunk, same rank as `shape`
    /// * `dtype`: Element data type
    pub fn new(
        shape: Vec<usize>,
        chunk_shape: Vec<usize>,
        dtype: DType,
    ) -> Result<Self, FetchBenchError> {
        let valid = shape.len() == chunk_shape.len()
            && !shape.is_empty()
            && shape.iter().all(|&dim| dim > 0)
            && std::iter::zip(&chunk_shape, &shape).all(|(&chunk, &dim)| chunk > 0 && chunk <= dim);
        if !valid {
            return Err(FetchBenchError::ChunkShapeMismatch { shape, chunk_shape });
        }
        Ok(Self {
            shape,
            chunk_shape,
            dtype,
        })
    }

    /// Returns the shape of the dataset.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the shape of one (non-edge) chunk.
    pub fn chunk_shape(&self) -> &[usize] {
        &self.chunk_shape
    }

    /// Returns the element data type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Returns the total number of elements.
    pub fn nelems(&self) -> usize {
        self.shape.iter().product()
    }

    /// Returns the total size of the dataset in bytes.
    pub fn nbytes(&self) -> usize {
        self.nelems() * self.dtype.size_of()
    }

    /// Returns the number of chunks along each axis (ceiling division).
    pub fn chunk_grid(&self) -> Vec<usize> {
        std::iter::zip(&self.shape, &self.chunk_shape)
            .map(|(&dim, &chunk)| dim.div_ceil(chunk))
            .collect()
    }

    /// Returns the total number of chunks.
    pub fn nchunks(&self) -> usize {
        self.chunk_grid().iter().product()
    }

    /// Returns the chunks of the dataset in row-major grid order.
    ///
    /// Chunk keys are the dotted grid index, e.g. `0.2.1`, prefixed with
    /// `prefix/` when a non-empty prefix is given. Edge chunks are clipped to
    /// the dataset bounds, so their byte counts may be smaller than
    /// [chunksize](ChunkedDataset::chunksize).
    ///
    /// # Arguments
    ///
    /// * `prefix`: Object key prefix of the dataset within the data source
    pub fn chunks(&self, prefix: &str) -> Vec<ChunkSpec> {
        let grid = self.chunk_grid();
        let mut chunks = Vec::with_capacity(self.nchunks());
        let mut index = vec![0; grid.len()];
        loop {
            chunks.push(self.chunk_spec(&index, prefix));
            // Advance the grid index, last axis fastest.
            let mut axis = grid.len();
            loop {
                if axis == 0 {
                    return chunks;
                }
                axis -= 1;
                index[axis] += 1;
                if index[axis] < grid[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }
    }

    /// Returns the [ChunkSpec] for one grid index.
    fn chunk_spec(&self, index: &[usize], prefix: &str) -> ChunkSpec {
        let nelems: usize = std::iter::zip(index, std::iter::zip(&self.shape, &self.chunk_shape))
            .map(|(&i, (&dim, &chunk))| std::cmp::min(chunk, dim - i * chunk))
            .product();
        let dotted = index
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        let key = if prefix.is_empty() {
            dotted
        } else {
            format!("{}/{}", prefix, dotted)
        };
        ChunkSpec {
            index: index.to_vec(),
            key,
            nbytes: nelems * self.dtype.size_of(),
        }
    }

    /// Returns the byte size of one representative (non-edge) chunk.
    pub fn chunksize(&self) -> usize {
        self.chunk_shape.iter().product::<usize>() * self.dtype.size_of()
    }
}

/// Returns the byte size of one representative chunk of `dataset`.
///
/// The product of the chunk shape dimensions times the element byte width.
pub fn get_chunksize(dataset: &ChunkedDataset) -> usize {
    dataset.chunksize()
}
