//! Typed, shaped array storage.
//!
//! A [`DataStore`] holds `tuples x components` elements of one type. The
//! tuple shape is mutable through [`DataStore::resize_tuples`]; the
//! component shape is fixed at construction.
//!
//! Three backings exist:
//! - contiguous: one flat buffer, tuple-major
//! - chunked: the tuple shape is tiled by a [`ChunkGrid`]; chunks may be
//!   supplied lazily by a [`ChunkSource`]
//! - empty: a placeholder that reports its shape but has no payload

use std::fmt;
use std::sync::Arc;

use datagraph_foundation::{ChunkGrid, Element, ElementType, Error, ErrorKind, Result, shape_len};
use parking_lot::RwLock;
use tracing::debug;

/// Supplies chunk payloads to a lazily loaded [`DataStore`].
///
/// A chunk's elements are ordered row-major over the chunk's clipped tuple
/// extent, with components innermost.
pub trait ChunkSource<T: Element>: Send + Sync + fmt::Debug {
    /// Reads chunk `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk cannot be read.
    fn read_chunk(&self, index: usize) -> Result<Vec<T>>;
}

#[derive(Clone, Debug)]
struct Chunked<T: Element> {
    grid: ChunkGrid,
    chunks: Vec<Option<Vec<T>>>,
    source: Option<Arc<dyn ChunkSource<T>>>,
}

#[derive(Clone, Debug)]
enum Backing<T: Element> {
    Contiguous(Vec<T>),
    Chunked(Chunked<T>),
    Empty,
}

#[derive(Clone, Debug)]
struct StoreState<T: Element> {
    tuple_shape: Vec<usize>,
    backing: Backing<T>,
}

/// A typed array of `tuples x components` elements.
///
/// The store carries its own lock, so a shared handle (`Arc<DataStore<T>>`)
/// can be read and written from several threads.
pub struct DataStore<T: Element> {
    component_shape: Vec<usize>,
    state: RwLock<StoreState<T>>,
}

impl<T: Element> fmt::Debug for DataStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        let backing = match &state.backing {
            Backing::Contiguous(_) => "contiguous",
            Backing::Chunked(_) => "chunked",
            Backing::Empty => "empty",
        };
        f.debug_struct("DataStore")
            .field("type", &T::TYPE)
            .field("tuple_shape", &state.tuple_shape)
            .field("component_shape", &self.component_shape)
            .field("backing", &backing)
            .finish()
    }
}

fn not_loaded() -> Error {
    Error::new(ErrorKind::PayloadNotLoaded(
        "store was created without a payload".to_string(),
    ))
}

impl<T: Element> Chunked<T> {
    fn ensure(&mut self, index: usize, ncomp: usize) -> Result<&mut Vec<T>> {
        let expected = self.grid.chunk_tuples(index)? * ncomp;
        let slot = &mut self.chunks[index];
        if slot.is_none() {
            let data = match &self.source {
                Some(source) => {
                    debug!(chunk = index, "loading chunk");
                    let data = source.read_chunk(index)?;
                    if data.len() != expected {
                        return Err(Error::shape_mismatch(&[expected], &[data.len()]));
                    }
                    data
                }
                None => vec![T::default(); expected],
            };
            *slot = Some(data);
        }
        slot.as_mut()
            .ok_or_else(|| Error::new(ErrorKind::PayloadNotLoaded(format!("chunk {index}"))))
    }

    fn locate(&self, index: usize, ncomp: usize) -> Result<(usize, usize)> {
        let (chunk, local) = self.grid.locate(index / ncomp)?;
        Ok((chunk, local * ncomp + index % ncomp))
    }

    fn assemble(&mut self, ncomp: usize) -> Result<Vec<T>> {
        let total = shape_len(self.grid.shape()) * ncomp;
        let mut out = vec![T::default(); total];
        for chunk in 0..self.grid.count() {
            let runs = self.grid.runs(chunk)?;
            let data = self.ensure(chunk, ncomp)?;
            for run in runs {
                let src = run.chunk_offset * ncomp;
                let dst = run.flat_offset * ncomp;
                let len = run.len * ncomp;
                out[dst..dst + len].copy_from_slice(&data[src..src + len]);
            }
        }
        Ok(out)
    }
}

/// Splits flat tuple-major values into row-major chunks of `grid`.
///
/// # Errors
///
/// Returns an error if `values` does not match the grid's shape.
pub fn split_into_chunks<T: Element>(grid: &ChunkGrid, ncomp: usize, values: &[T]) -> Result<Vec<Vec<T>>> {
    let total = shape_len(grid.shape()) * ncomp;
    if values.len() != total {
        return Err(Error::shape_mismatch(&[total], &[values.len()]));
    }
    let mut chunks = Vec::with_capacity(grid.count());
    for chunk in 0..grid.count() {
        let mut data = Vec::with_capacity(grid.chunk_tuples(chunk)? * ncomp);
        for run in grid.runs(chunk)? {
            let start = run.flat_offset * ncomp;
            data.extend_from_slice(&values[start..start + run.len * ncomp]);
        }
        chunks.push(data);
    }
    Ok(chunks)
}

impl<T: Element> StoreState<T> {
    fn peek(&self, index: usize, ncomp: usize) -> Result<Option<T>> {
        match &self.backing {
            Backing::Contiguous(data) => Ok(Some(data[index])),
            Backing::Chunked(chunked) => {
                let (chunk, offset) = chunked.locate(index, ncomp)?;
                Ok(chunked.chunks[chunk].as_ref().map(|data| data[offset]))
            }
            Backing::Empty => Err(not_loaded()),
        }
    }

    fn fetch(&mut self, index: usize, ncomp: usize) -> Result<T> {
        match &mut self.backing {
            Backing::Contiguous(data) => Ok(data[index]),
            Backing::Chunked(chunked) => {
                let (chunk, offset) = chunked.locate(index, ncomp)?;
                Ok(chunked.ensure(chunk, ncomp)?[offset])
            }
            Backing::Empty => Err(not_loaded()),
        }
    }

    fn store(&mut self, index: usize, ncomp: usize, value: T) -> Result<()> {
        match &mut self.backing {
            Backing::Contiguous(data) => {
                data[index] = value;
                Ok(())
            }
            Backing::Chunked(chunked) => {
                let (chunk, offset) = chunked.locate(index, ncomp)?;
                chunked.ensure(chunk, ncomp)?[offset] = value;
                Ok(())
            }
            Backing::Empty => Err(not_loaded()),
        }
    }

    fn read_range(&mut self, start: usize, len: usize, ncomp: usize) -> Result<Vec<T>> {
        if let Backing::Contiguous(data) = &self.backing {
            return Ok(data[start..start + len].to_vec());
        }
        (start..start + len).map(|i| self.fetch(i, ncomp)).collect()
    }

    fn write_range(&mut self, start: usize, values: &[T], ncomp: usize) -> Result<()> {
        if let Backing::Contiguous(data) = &mut self.backing {
            data[start..start + values.len()].copy_from_slice(values);
            return Ok(());
        }
        for (i, value) in values.iter().enumerate() {
            self.store(start + i, ncomp, *value)?;
        }
        Ok(())
    }

    fn to_vec(&mut self, ncomp: usize) -> Result<Vec<T>> {
        match &mut self.backing {
            Backing::Contiguous(data) => Ok(data.clone()),
            Backing::Chunked(chunked) => chunked.assemble(ncomp),
            Backing::Empty => Err(not_loaded()),
        }
    }
}

impl<T: Element> DataStore<T> {
    /// Creates a contiguous store filled with the default value.
    #[must_use]
    pub fn new(tuple_shape: Vec<usize>, component_shape: Vec<usize>) -> Self {
        let len = shape_len(&tuple_shape) * shape_len(&component_shape);
        Self {
            component_shape,
            state: RwLock::new(StoreState {
                tuple_shape,
                backing: Backing::Contiguous(vec![T::default(); len]),
            }),
        }
    }

    /// Creates a contiguous store from flat tuple-major values.
    ///
    /// # Errors
    ///
    /// Returns an error if `values` does not hold exactly
    /// `tuples x components` elements.
    pub fn from_vec(tuple_shape: Vec<usize>, component_shape: Vec<usize>, values: Vec<T>) -> Result<Self> {
        let len = shape_len(&tuple_shape) * shape_len(&component_shape);
        if values.len() != len {
            return Err(Error::shape_mismatch(&[len], &[values.len()]));
        }
        Ok(Self {
            component_shape,
            state: RwLock::new(StoreState {
                tuple_shape,
                backing: Backing::Contiguous(values),
            }),
        })
    }

    /// Creates a placeholder store with a shape but no payload.
    #[must_use]
    pub fn empty(tuple_shape: Vec<usize>, component_shape: Vec<usize>) -> Self {
        Self {
            component_shape,
            state: RwLock::new(StoreState {
                tuple_shape,
                backing: Backing::Empty,
            }),
        }
    }

    /// Creates an in-memory chunked store filled with the default value.
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_shape` does not match the tuple rank.
    pub fn chunked(tuple_shape: Vec<usize>, component_shape: Vec<usize>, chunk_shape: &[usize]) -> Result<Self> {
        let grid = ChunkGrid::new(&tuple_shape, chunk_shape)?;
        let ncomp = shape_len(&component_shape);
        let chunks = (0..grid.count())
            .map(|c| Ok(Some(vec![T::default(); grid.chunk_tuples(c)? * ncomp])))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            component_shape,
            state: RwLock::new(StoreState {
                tuple_shape,
                backing: Backing::Chunked(Chunked {
                    grid,
                    chunks,
                    source: None,
                }),
            }),
        })
    }

    /// Creates a chunked store whose chunks are read from `source` on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_shape` does not match the tuple rank.
    pub fn with_source(
        tuple_shape: Vec<usize>,
        component_shape: Vec<usize>,
        chunk_shape: &[usize],
        source: Arc<dyn ChunkSource<T>>,
    ) -> Result<Self> {
        let grid = ChunkGrid::new(&tuple_shape, chunk_shape)?;
        let chunks = vec![None; grid.count()];
        Ok(Self {
            component_shape,
            state: RwLock::new(StoreState {
                tuple_shape,
                backing: Backing::Chunked(Chunked {
                    grid,
                    chunks,
                    source: Some(source),
                }),
            }),
        })
    }

    /// Returns an independent copy sharing nothing mutable with `self`.
    ///
    /// Unloaded chunks stay unloaded and keep reading from the same source.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            component_shape: self.component_shape.clone(),
            state: RwLock::new(self.state.read().clone()),
        }
    }

    /// The element type.
    #[must_use]
    pub fn element_type(&self) -> ElementType {
        T::TYPE
    }

    /// The current tuple shape.
    #[must_use]
    pub fn tuple_shape(&self) -> Vec<usize> {
        self.state.read().tuple_shape.clone()
    }

    /// The fixed component shape.
    #[must_use]
    pub fn component_shape(&self) -> &[usize] {
        &self.component_shape
    }

    /// Number of tuples.
    #[must_use]
    pub fn num_tuples(&self) -> usize {
        shape_len(&self.state.read().tuple_shape)
    }

    /// Number of components per tuple.
    #[must_use]
    pub fn num_components(&self) -> usize {
        shape_len(&self.component_shape)
    }

    /// Total number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.num_tuples() * self.num_components()
    }

    /// Returns true if the store holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns false for placeholder stores.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        !matches!(self.state.read().backing, Backing::Empty)
    }

    /// The chunk shape, or `None` if the store is not chunked.
    #[must_use]
    pub fn chunk_shape(&self) -> Option<Vec<usize>> {
        match &self.state.read().backing {
            Backing::Chunked(chunked) => Some(chunked.grid.chunk_shape().to_vec()),
            _ => None,
        }
    }

    fn element_index(&self, tuple: usize, component: usize) -> Result<usize> {
        let tuples = self.num_tuples();
        let ncomp = self.num_components();
        if tuple >= tuples {
            return Err(Error::out_of_range(tuple, tuples));
        }
        if component >= ncomp {
            return Err(Error::out_of_range(component, ncomp));
        }
        Ok(tuple * ncomp + component)
    }

    /// Reads one element.
    ///
    /// # Errors
    ///
    /// Returns an error if the position is out of range, the store is a
    /// placeholder, or a lazily loaded chunk cannot be read.
    pub fn get(&self, tuple: usize, component: usize) -> Result<T> {
        self.get_flat(self.element_index(tuple, component)?)
    }

    /// Reads one element by flat index.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range or the payload is unavailable.
    pub fn get_flat(&self, index: usize) -> Result<T> {
        let ncomp = self.num_components();
        {
            let state = self.state.read();
            let len = shape_len(&state.tuple_shape) * ncomp;
            if index >= len {
                return Err(Error::out_of_range(index, len));
            }
            if let Some(value) = state.peek(index, ncomp)? {
                return Ok(value);
            }
        }
        self.state.write().fetch(index, ncomp)
    }

    /// Writes one element.
    ///
    /// # Errors
    ///
    /// Returns an error if the position is out of range or the payload is unavailable.
    pub fn set(&self, tuple: usize, component: usize, value: T) -> Result<()> {
        self.set_flat(self.element_index(tuple, component)?, value)
    }

    /// Writes one element by flat index.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range or the payload is unavailable.
    pub fn set_flat(&self, index: usize, value: T) -> Result<()> {
        let ncomp = self.num_components();
        let mut state = self.state.write();
        let len = shape_len(&state.tuple_shape) * ncomp;
        if index >= len {
            return Err(Error::out_of_range(index, len));
        }
        state.store(index, ncomp, value)
    }

    /// Reads all components of one tuple.
    ///
    /// # Errors
    ///
    /// Returns an error if `tuple` is out of range or the payload is unavailable.
    pub fn tuple(&self, tuple: usize) -> Result<Vec<T>> {
        let start = self.element_index(tuple, 0)?;
        let ncomp = self.num_components();
        self.state.write().read_range(start, ncomp, ncomp)
    }

    /// Sets every element to `value`.
    ///
    /// # Errors
    ///
    /// Returns an error for placeholder stores.
    pub fn fill(&self, value: T) -> Result<()> {
        let ncomp = self.num_components();
        let mut state = self.state.write();
        match &mut state.backing {
            Backing::Contiguous(data) => data.fill(value),
            Backing::Chunked(chunked) => {
                for c in 0..chunked.grid.count() {
                    let len = chunked.grid.chunk_tuples(c)? * ncomp;
                    chunked.chunks[c] = Some(vec![value; len]);
                }
            }
            Backing::Empty => return Err(not_loaded()),
        }
        Ok(())
    }

    /// Changes the tuple shape.
    ///
    /// Existing elements are kept up to the smaller of the old and new flat
    /// lengths; new elements take the default value. Chunked stores become
    /// contiguous. Placeholder stores only record the new shape.
    ///
    /// # Errors
    ///
    /// Returns an error if a lazily loaded chunk cannot be read.
    pub fn resize_tuples(&self, tuple_shape: Vec<usize>) -> Result<()> {
        let ncomp = self.num_components();
        let new_len = shape_len(&tuple_shape) * ncomp;
        let mut state = self.state.write();
        debug!(
            element_type = %T::TYPE,
            from = ?state.tuple_shape,
            to = ?tuple_shape,
            "resizing store"
        );
        let backing = if matches!(state.backing, Backing::Empty) {
            Backing::Empty
        } else {
            let mut data = state.to_vec(ncomp)?;
            data.resize(new_len, T::default());
            Backing::Contiguous(data)
        };
        state.backing = backing;
        state.tuple_shape = tuple_shape;
        Ok(())
    }

    /// Copies `count` tuples from `source` starting at `src_tuple` into this
    /// store starting at `dst_tuple`.
    ///
    /// `source` may be `self`; overlapping ranges copy as if through a
    /// temporary buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the component shapes differ or either range is
    /// out of bounds.
    pub fn copy_from(&self, dst_tuple: usize, source: &DataStore<T>, src_tuple: usize, count: usize) -> Result<()> {
        if self.component_shape != source.component_shape {
            return Err(Error::shape_mismatch(&self.component_shape, &source.component_shape));
        }
        let ncomp = self.num_components();

        if std::ptr::eq(self, source) {
            let mut state = self.state.write();
            let tuples = shape_len(&state.tuple_shape);
            check_range(src_tuple, count, tuples)?;
            check_range(dst_tuple, count, tuples)?;
            let values = state.read_range(src_tuple * ncomp, count * ncomp, ncomp)?;
            return state.write_range(dst_tuple * ncomp, &values, ncomp);
        }

        // Lock in address order so two opposing copies cannot deadlock.
        let self_first = std::ptr::from_ref(self) < std::ptr::from_ref(source);
        let (mut dst, mut src) = if self_first {
            let dst = self.state.write();
            (dst, source.state.write())
        } else {
            let src = source.state.write();
            (self.state.write(), src)
        };
        check_range(src_tuple, count, shape_len(&src.tuple_shape))?;
        check_range(dst_tuple, count, shape_len(&dst.tuple_shape))?;
        let values = src.read_range(src_tuple * ncomp, count * ncomp, ncomp)?;
        dst.write_range(dst_tuple * ncomp, &values, ncomp)
    }

    /// Returns all elements in flat tuple-major order.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is unavailable.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        let ncomp = self.num_components();
        self.state.write().to_vec(ncomp)
    }

    /// Runs `f` over the flat element slice.
    ///
    /// Chunked stores are assembled into a temporary buffer first.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is unavailable.
    pub fn with_slice<R>(&self, f: impl FnOnce(&[T]) -> R) -> Result<R> {
        {
            let state = self.state.read();
            if let Backing::Contiguous(data) = &state.backing {
                return Ok(f(data));
            }
        }
        let data = self.to_vec()?;
        Ok(f(&data))
    }

    /// Converts a chunked store into a contiguous one.
    ///
    /// # Errors
    ///
    /// Returns an error if a chunk cannot be read or the store is a placeholder.
    pub fn make_contiguous(&self) -> Result<()> {
        let ncomp = self.num_components();
        let mut state = self.state.write();
        if matches!(state.backing, Backing::Empty) {
            return Err(not_loaded());
        }
        if matches!(state.backing, Backing::Chunked(_)) {
            let data = state.to_vec(ncomp)?;
            state.backing = Backing::Contiguous(data);
        }
        Ok(())
    }

    /// Re-tiles the store with a new chunk shape, loading every chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_shape` does not match the tuple rank or
    /// the payload is unavailable.
    pub fn rechunk(&self, chunk_shape: &[usize]) -> Result<()> {
        let ncomp = self.num_components();
        let mut state = self.state.write();
        let grid = ChunkGrid::new(&state.tuple_shape, chunk_shape)?;
        let data = state.to_vec(ncomp)?;
        let chunks = split_into_chunks(&grid, ncomp, &data)?
            .into_iter()
            .map(Some)
            .collect();
        state.backing = Backing::Chunked(Chunked {
            grid,
            chunks,
            source: None,
        });
        Ok(())
    }

    /// Number of chunks: 1 for contiguous stores, 0 for placeholders.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        match &self.state.read().backing {
            Backing::Contiguous(_) => 1,
            Backing::Chunked(chunked) => chunked.grid.count(),
            Backing::Empty => 0,
        }
    }

    /// Tuple bounds `(lower, upper)` of a chunk; upper is exclusive.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range.
    pub fn chunk_bounds(&self, index: usize) -> Result<(Vec<usize>, Vec<usize>)> {
        let state = self.state.read();
        match &state.backing {
            Backing::Chunked(chunked) => chunked.grid.bounds(index),
            Backing::Contiguous(_) if index == 0 => {
                Ok((vec![0; state.tuple_shape.len()], state.tuple_shape.clone()))
            }
            Backing::Contiguous(_) => Err(Error::out_of_range(index, 1)),
            Backing::Empty => Err(Error::out_of_range(index, 0)),
        }
    }

    /// Makes chunk `index` resident.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range or the chunk cannot be read.
    pub fn load_chunk(&self, index: usize) -> Result<()> {
        let ncomp = self.num_components();
        let mut state = self.state.write();
        match &mut state.backing {
            Backing::Chunked(chunked) => {
                if index >= chunked.grid.count() {
                    return Err(Error::out_of_range(index, chunked.grid.count()));
                }
                chunked.ensure(index, ncomp)?;
                Ok(())
            }
            Backing::Contiguous(_) if index == 0 => Ok(()),
            Backing::Contiguous(_) => Err(Error::out_of_range(index, 1)),
            Backing::Empty => Err(not_loaded()),
        }
    }

    /// Returns true if chunk `index` is resident.
    #[must_use]
    pub fn is_chunk_loaded(&self, index: usize) -> bool {
        match &self.state.read().backing {
            Backing::Chunked(chunked) => chunked.chunks.get(index).is_some_and(Option::is_some),
            Backing::Contiguous(_) => index == 0,
            Backing::Empty => false,
        }
    }

    /// Returns the elements of chunk `index`, loading it if needed.
    ///
    /// For contiguous stores chunk 0 is the whole array.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range or the chunk cannot be read.
    pub fn chunk_values(&self, index: usize) -> Result<Vec<T>> {
        let ncomp = self.num_components();
        let mut state = self.state.write();
        match &mut state.backing {
            Backing::Chunked(chunked) => {
                if index >= chunked.grid.count() {
                    return Err(Error::out_of_range(index, chunked.grid.count()));
                }
                Ok(chunked.ensure(index, ncomp)?.clone())
            }
            Backing::Contiguous(data) if index == 0 => Ok(data.clone()),
            Backing::Contiguous(_) => Err(Error::out_of_range(index, 1)),
            Backing::Empty => Err(not_loaded()),
        }
    }

    /// Bit-exact comparison of shapes and contents.
    ///
    /// # Errors
    ///
    /// Returns an error if either payload is unavailable.
    pub fn content_eq(&self, other: &DataStore<T>) -> Result<bool> {
        if self.component_shape != other.component_shape || self.tuple_shape() != other.tuple_shape() {
            return Ok(false);
        }
        let a = self.to_vec()?;
        let b = other.to_vec()?;
        Ok(datagraph_foundation::slices_bits_eq(&a, &b))
    }
}

fn check_range(start: usize, count: usize, len: usize) -> Result<()> {
    match start.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(Error::out_of_range(start.saturating_add(count), len)),
    }
}
