//! Shape arithmetic and chunk decomposition.
//!
//! Shapes are listed slowest-varying first; the last dimension is
//! contiguous in memory. A [`ChunkGrid`] tiles a tuple shape with
//! fixed-size boxes (edge chunks are clipped) and numbers them in
//! row-major order.

use crate::error::{Error, Result};

/// Number of elements described by a shape.
///
/// The empty shape describes a single element.
#[must_use]
pub fn shape_len(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Row-major flat index of a position within a shape.
#[must_use]
pub fn flat_index(position: &[usize], shape: &[usize]) -> usize {
    position
        .iter()
        .zip(shape)
        .fold(0, |acc, (&p, &dim)| acc * dim + p)
}

/// Inverse of [`flat_index`].
#[must_use]
pub fn unflatten(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut position = vec![0; shape.len()];
    for (slot, &dim) in position.iter_mut().zip(shape).rev() {
        if dim == 0 {
            continue;
        }
        *slot = flat % dim;
        flat /= dim;
    }
    position
}

/// A contiguous run shared by a chunk and the full tuple range.
///
/// All quantities are in tuples; multiply by the component count for
/// element offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkRun {
    /// Offset of the run inside the chunk.
    pub chunk_offset: usize,
    /// Offset of the run inside the full shape.
    pub flat_offset: usize,
    /// Number of tuples in the run.
    pub len: usize,
}

/// Row-major tiling of a tuple shape into chunks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkGrid {
    shape: Vec<usize>,
    chunk_shape: Vec<usize>,
    grid: Vec<usize>,
}

impl ChunkGrid {
    /// Creates a grid tiling `shape` with boxes of `chunk_shape`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ranks differ or a chunk dimension is zero.
    pub fn new(shape: &[usize], chunk_shape: &[usize]) -> Result<Self> {
        if shape.len() != chunk_shape.len() || chunk_shape.contains(&0) {
            return Err(Error::shape_mismatch(shape, chunk_shape));
        }
        let grid = shape
            .iter()
            .zip(chunk_shape)
            .map(|(&dim, &chunk)| dim.div_ceil(chunk))
            .collect();
        Ok(Self {
            shape: shape.to_vec(),
            chunk_shape: chunk_shape.to_vec(),
            grid,
        })
    }

    /// The tiled shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The nominal chunk box.
    #[must_use]
    pub fn chunk_shape(&self) -> &[usize] {
        &self.chunk_shape
    }

    /// Number of chunks along each dimension.
    #[must_use]
    pub fn grid(&self) -> &[usize] {
        &self.grid
    }

    /// Total number of chunks.
    #[must_use]
    pub fn count(&self) -> usize {
        shape_len(&self.grid)
    }

    /// Lower (inclusive) and upper (exclusive) tuple bounds of a chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range.
    pub fn bounds(&self, index: usize) -> Result<(Vec<usize>, Vec<usize>)> {
        if index >= self.count() {
            return Err(Error::out_of_range(index, self.count()));
        }
        let coord = unflatten(index, &self.grid);
        let lower: Vec<usize> = coord
            .iter()
            .zip(&self.chunk_shape)
            .map(|(&c, &chunk)| c * chunk)
            .collect();
        let upper = lower
            .iter()
            .zip(&self.chunk_shape)
            .zip(&self.shape)
            .map(|((&lo, &chunk), &dim)| (lo + chunk).min(dim))
            .collect();
        Ok((lower, upper))
    }

    /// Clipped extent of a chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range.
    pub fn extent(&self, index: usize) -> Result<Vec<usize>> {
        let (lower, upper) = self.bounds(index)?;
        Ok(upper.iter().zip(&lower).map(|(hi, lo)| hi - lo).collect())
    }

    /// Number of tuples held by a chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range.
    pub fn chunk_tuples(&self, index: usize) -> Result<usize> {
        Ok(shape_len(&self.extent(index)?))
    }

    /// Maps a flat tuple index to `(chunk index, tuple offset in chunk)`.
    ///
    /// # Errors
    ///
    /// Returns an error if `tuple` is out of range.
    pub fn locate(&self, tuple: usize) -> Result<(usize, usize)> {
        let total = shape_len(&self.shape);
        if tuple >= total {
            return Err(Error::out_of_range(tuple, total));
        }
        let position = unflatten(tuple, &self.shape);
        let coord: Vec<usize> = position
            .iter()
            .zip(&self.chunk_shape)
            .map(|(&p, &chunk)| p / chunk)
            .collect();
        let chunk_index = flat_index(&coord, &self.grid);
        let (lower, upper) = self.bounds(chunk_index)?;
        let extent: Vec<usize> = upper.iter().zip(&lower).map(|(hi, lo)| hi - lo).collect();
        let local: Vec<usize> = position.iter().zip(&lower).map(|(p, lo)| p - lo).collect();
        Ok((chunk_index, flat_index(&local, &extent)))
    }

    /// Contiguous runs that map a chunk onto the full shape.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range.
    pub fn runs(&self, index: usize) -> Result<Vec<ChunkRun>> {
        let (lower, upper) = self.bounds(index)?;
        let rank = self.shape.len();
        if rank == 0 {
            return Ok(vec![ChunkRun {
                chunk_offset: 0,
                flat_offset: 0,
                len: 1,
            }]);
        }
        let extent: Vec<usize> = upper.iter().zip(&lower).map(|(hi, lo)| hi - lo).collect();
        if extent.contains(&0) {
            return Ok(Vec::new());
        }
        let run_len = extent[rank - 1];
        let outer = &extent[..rank - 1];
        let run_count = shape_len(outer);

        let mut runs = Vec::with_capacity(run_count);
        let mut position = lower.clone();
        for run in 0..run_count {
            let local = unflatten(run, outer);
            for (d, l) in local.iter().enumerate() {
                position[d] = lower[d] + l;
            }
            position[rank - 1] = lower[rank - 1];
            runs.push(ChunkRun {
                chunk_offset: run * run_len,
                flat_offset: flat_index(&position, &self.shape),
                len: run_len,
            });
        }
        Ok(runs)
    }
}
