//! Variable-length list storage.
//!
//! A [`ListStore`] keeps every row in a fixed-width slot of one flat buffer
//! (`rows x slot_width`) plus a per-row length table. Widening the slot
//! re-lays the whole buffer.

use std::fmt;

use datagraph_foundation::{Element, ElementType, Error, Result, shape_len};
use parking_lot::RwLock;
use tracing::debug;

#[derive(Clone, Debug)]
struct ListState<T: Element> {
    tuple_shape: Vec<usize>,
    slot_width: usize,
    lengths: Vec<usize>,
    data: Vec<T>,
    loaded: bool,
}

impl<T: Element> ListState<T> {
    fn rows(&self) -> usize {
        self.lengths.len()
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.rows() {
            return Err(Error::out_of_range(row, self.rows()));
        }
        Ok(())
    }

    fn reserve(&mut self, width: usize) {
        if width <= self.slot_width {
            return;
        }
        debug!(
            element_type = %T::TYPE,
            rows = self.rows(),
            from = self.slot_width,
            to = width,
            "widening list slots"
        );
        let mut data = vec![T::default(); self.rows() * width];
        for (row, &len) in self.lengths.iter().enumerate() {
            let src = row * self.slot_width;
            data[row * width..row * width + len].copy_from_slice(&self.data[src..src + len]);
        }
        self.data = data;
        self.slot_width = width;
    }

    fn row(&self, row: usize) -> &[T] {
        let start = row * self.slot_width;
        &self.data[start..start + self.lengths[row]]
    }
}

/// A store of variable-length rows of one element type.
pub struct ListStore<T: Element> {
    state: RwLock<ListState<T>>,
}

impl<T: Element> fmt::Debug for ListStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("ListStore")
            .field("type", &T::TYPE)
            .field("tuple_shape", &state.tuple_shape)
            .field("slot_width", &state.slot_width)
            .finish_non_exhaustive()
    }
}

impl<T: Element> ListStore<T> {
    /// Creates a store of empty rows.
    #[must_use]
    pub fn new(tuple_shape: Vec<usize>) -> Self {
        Self::with_slot_width(tuple_shape, 0)
    }

    /// Creates a store of empty rows with a reserved slot width.
    #[must_use]
    pub fn with_slot_width(tuple_shape: Vec<usize>, slot_width: usize) -> Self {
        let rows = shape_len(&tuple_shape);
        Self {
            state: RwLock::new(ListState {
                tuple_shape,
                slot_width,
                lengths: vec![0; rows],
                data: vec![T::default(); rows * slot_width],
                loaded: true,
            }),
        }
    }

    /// Creates a placeholder store with a row table shape but no rows.
    ///
    /// Every row reads as empty; the store reports itself as not loaded.
    #[must_use]
    pub fn empty(tuple_shape: Vec<usize>) -> Self {
        let store = Self::new(tuple_shape);
        store.state.write().loaded = false;
        store
    }

    /// Creates a store from explicit rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of rows disagrees with `tuple_shape`.
    pub fn from_rows(tuple_shape: Vec<usize>, rows: &[Vec<T>]) -> Result<Self> {
        let expected = shape_len(&tuple_shape);
        if rows.len() != expected {
            return Err(Error::shape_mismatch(&[expected], &[rows.len()]));
        }
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let store = Self::with_slot_width(tuple_shape, width);
        {
            let mut state = store.state.write();
            for (r, values) in rows.iter().enumerate() {
                state.data[r * width..r * width + values.len()].copy_from_slice(values);
                state.lengths[r] = values.len();
            }
        }
        Ok(store)
    }

    /// Creates a store from a length table and the concatenated row values.
    ///
    /// # Errors
    ///
    /// Returns an error if the lengths disagree with `tuple_shape` or do not
    /// sum to `flat.len()`.
    pub fn from_flat(tuple_shape: Vec<usize>, lengths: &[usize], flat: &[T]) -> Result<Self> {
        let expected = shape_len(&tuple_shape);
        if lengths.len() != expected {
            return Err(Error::shape_mismatch(&[expected], &[lengths.len()]));
        }
        let total: usize = lengths.iter().sum();
        if total != flat.len() {
            return Err(Error::shape_mismatch(&[total], &[flat.len()]));
        }
        let width = lengths.iter().copied().max().unwrap_or(0);
        let store = Self::with_slot_width(tuple_shape, width);
        {
            let mut state = store.state.write();
            let mut offset = 0;
            for (r, &len) in lengths.iter().enumerate() {
                state.data[r * width..r * width + len].copy_from_slice(&flat[offset..offset + len]);
                state.lengths[r] = len;
                offset += len;
            }
        }
        Ok(store)
    }

    /// Returns an independent copy.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            state: RwLock::new(self.state.read().clone()),
        }
    }

    /// The element type.
    #[must_use]
    pub fn element_type(&self) -> ElementType {
        T::TYPE
    }

    /// The tuple shape of the row table.
    #[must_use]
    pub fn tuple_shape(&self) -> Vec<usize> {
        self.state.read().tuple_shape.clone()
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.state.read().rows()
    }

    /// Returns false for placeholder stores.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state.read().loaded
    }

    /// Current reserved slot width.
    #[must_use]
    pub fn slot_width(&self) -> usize {
        self.state.read().slot_width
    }

    /// Length of one row.
    ///
    /// # Errors
    ///
    /// Returns an error if `row` is out of range.
    pub fn length(&self, row: usize) -> Result<usize> {
        let state = self.state.read();
        state.check_row(row)?;
        Ok(state.lengths[row])
    }

    /// Reads element `k` of `row`.
    ///
    /// # Errors
    ///
    /// Returns an error if `row` or `k` is out of range.
    pub fn get(&self, row: usize, k: usize) -> Result<T> {
        let state = self.state.read();
        state.check_row(row)?;
        let len = state.lengths[row];
        if k >= len {
            return Err(Error::out_of_range(k, len));
        }
        Ok(state.data[row * state.slot_width + k])
    }

    /// Returns a copy of one row.
    ///
    /// # Errors
    ///
    /// Returns an error if `row` is out of range.
    pub fn row(&self, row: usize) -> Result<Vec<T>> {
        let state = self.state.read();
        state.check_row(row)?;
        Ok(state.row(row).to_vec())
    }

    /// Replaces the contents of `row`, widening every slot if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if `row` is out of range.
    pub fn set_row(&self, row: usize, values: &[T]) -> Result<()> {
        let mut state = self.state.write();
        state.check_row(row)?;
        state.reserve(values.len());
        let start = row * state.slot_width;
        state.data[start..start + values.len()].copy_from_slice(values);
        state.lengths[row] = values.len();
        Ok(())
    }

    /// Appends one value to `row`, doubling the slot width when full.
    ///
    /// # Errors
    ///
    /// Returns an error if `row` is out of range.
    pub fn push(&self, row: usize, value: T) -> Result<()> {
        let mut state = self.state.write();
        state.check_row(row)?;
        let len = state.lengths[row];
        if len == state.slot_width {
            let width = (state.slot_width * 2).max(4);
            state.reserve(width);
        }
        let index = row * state.slot_width + len;
        state.data[index] = value;
        state.lengths[row] = len + 1;
        Ok(())
    }

    /// Empties `row`.
    ///
    /// # Errors
    ///
    /// Returns an error if `row` is out of range.
    pub fn clear_row(&self, row: usize) -> Result<()> {
        let mut state = self.state.write();
        state.check_row(row)?;
        state.lengths[row] = 0;
        Ok(())
    }

    /// Grows the slot width to at least `width`; never shrinks.
    pub fn reserve_slot_width(&self, width: usize) {
        self.state.write().reserve(width);
    }

    /// Changes the row table shape; new rows are empty.
    pub fn resize_rows(&self, tuple_shape: Vec<usize>) {
        let mut state = self.state.write();
        let rows = shape_len(&tuple_shape);
        let width = state.slot_width;
        state.lengths.resize(rows, 0);
        state.data.resize(rows * width, T::default());
        state.tuple_shape = tuple_shape;
    }

    /// Sum of all row lengths.
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.state.read().lengths.iter().sum()
    }

    /// Row lengths in row order.
    #[must_use]
    pub fn lengths(&self) -> Vec<usize> {
        self.state.read().lengths.clone()
    }

    /// Concatenation of every row, in row order.
    #[must_use]
    pub fn flatten(&self) -> Vec<T> {
        let state = self.state.read();
        let mut out = Vec::with_capacity(state.lengths.iter().sum());
        for row in 0..state.rows() {
            out.extend_from_slice(state.row(row));
        }
        out
    }

    /// All rows as owned vectors.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<T>> {
        let state = self.state.read();
        (0..state.rows()).map(|r| state.row(r).to_vec()).collect()
    }

    /// Bit-exact comparison of shapes, lengths, and row contents.
    ///
    /// Slot widths are an allocation detail and are ignored.
    #[must_use]
    pub fn content_eq(&self, other: &ListStore<T>) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let a = self.state.read();
        let b = other.state.read();
        a.tuple_shape == b.tuple_shape
            && a.loaded == b.loaded
            && a.lengths == b.lengths
            && (0..a.rows()).all(|r| datagraph_foundation::slices_bits_eq(a.row(r), b.row(r)))
    }
}
