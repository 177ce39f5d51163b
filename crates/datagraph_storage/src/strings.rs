//! String array storage.

use datagraph_foundation::{Error, Result};
use parking_lot::RwLock;

/// A resizable array of strings, one per tuple.
#[derive(Debug)]
pub struct StringStore {
    values: RwLock<Vec<String>>,
    loaded: bool,
}

impl Default for StringStore {
    fn default() -> Self {
        Self::from_vec(Vec::new())
    }
}

impl StringStore {
    /// Creates a store of `len` empty strings.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self::from_vec(vec![String::new(); len])
    }

    /// Creates a store holding `values`.
    #[must_use]
    pub fn from_vec(values: Vec<String>) -> Self {
        Self {
            values: RwLock::new(values),
            loaded: true,
        }
    }

    /// Creates a placeholder of `len` empty strings that reports itself as
    /// not loaded.
    #[must_use]
    pub fn empty(len: usize) -> Self {
        Self {
            values: RwLock::new(vec![String::new(); len]),
            loaded: false,
        }
    }

    /// Returns an independent copy.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            values: RwLock::new(self.to_vec()),
            loaded: self.loaded,
        }
    }

    /// Returns false for placeholder stores.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Number of strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Returns true if the store holds no strings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads one string.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range.
    pub fn get(&self, index: usize) -> Result<String> {
        let values = self.values.read();
        values
            .get(index)
            .cloned()
            .ok_or_else(|| Error::out_of_range(index, values.len()))
    }

    /// Replaces one string.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range.
    pub fn set(&self, index: usize, value: impl Into<String>) -> Result<()> {
        let mut values = self.values.write();
        let len = values.len();
        let slot = values.get_mut(index).ok_or_else(|| Error::out_of_range(index, len))?;
        *slot = value.into();
        Ok(())
    }

    /// Resizes the store; new entries are empty strings.
    pub fn resize(&self, len: usize) {
        self.values.write().resize(len, String::new());
    }

    /// All strings in order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.values.read().clone()
    }

    /// Compares contents.
    #[must_use]
    pub fn content_eq(&self, other: &StringStore) -> bool {
        std::ptr::eq(self, other) || (self.loaded == other.loaded && *self.values.read() == *other.values.read())
    }
}
