//! Type-erased array and list stores.
//!
//! [`TypedArray`] and [`TypedList`] wrap a store of any element type so the
//! graph can hold heterogeneous payloads. [`StoreElement`] recovers the
//! concrete store, and the byte-level helpers let the serializer move
//! payloads without naming the element type.

// Index conversions from stored integers
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use datagraph_foundation::{Element, ElementType, Error, ErrorKind, Result, for_each_element};

use crate::array::{ChunkSource, DataStore};
use crate::list::ListStore;

/// Supplies raw little-endian chunk bytes for a lazily loaded array.
pub trait RawChunkSource: Send + Sync + fmt::Debug {
    /// Reads the encoded bytes of chunk `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk cannot be read.
    fn read_chunk_bytes(&self, index: usize) -> Result<Vec<u8>>;
}

struct Decoding<T> {
    raw: Arc<dyn RawChunkSource>,
    marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for Decoding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoding").field("raw", &self.raw).finish()
    }
}

impl<T: Element> ChunkSource<T> for Decoding<T> {
    fn read_chunk(&self, index: usize) -> Result<Vec<T>> {
        T::decode(&self.raw.read_chunk_bytes(index)?)
    }
}

/// Element types that can be recovered from the type-erased stores.
pub trait StoreElement: Element {
    /// Borrows the concrete array store if the element type matches.
    fn array(store: &TypedArray) -> Option<&DataStore<Self>>;

    /// Borrows the concrete list store if the element type matches.
    fn list(store: &TypedList) -> Option<&ListStore<Self>>;

    /// Wraps a concrete array store.
    fn wrap_array(store: DataStore<Self>) -> TypedArray;

    /// Wraps a concrete list store.
    fn wrap_list(store: ListStore<Self>) -> TypedList;
}

macro_rules! define_typed_stores {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        /// A [`DataStore`] of any element type.
        #[derive(Debug)]
        pub enum TypedArray {
            $(
                #[doc = concat!("`", stringify!($ty), "` elements.")]
                $variant(DataStore<$ty>),
            )*
        }

        /// A [`ListStore`] of any element type.
        #[derive(Debug)]
        pub enum TypedList {
            $(
                #[doc = concat!("`", stringify!($ty), "` elements.")]
                $variant(ListStore<$ty>),
            )*
        }

        $(
            impl StoreElement for $ty {
                fn array(store: &TypedArray) -> Option<&DataStore<Self>> {
                    match store {
                        TypedArray::$variant(s) => Some(s),
                        _ => None,
                    }
                }

                fn list(store: &TypedList) -> Option<&ListStore<Self>> {
                    match store {
                        TypedList::$variant(s) => Some(s),
                        _ => None,
                    }
                }

                fn wrap_array(store: DataStore<Self>) -> TypedArray {
                    TypedArray::$variant(store)
                }

                fn wrap_list(store: ListStore<Self>) -> TypedList {
                    TypedList::$variant(store)
                }
            }
        )*

        impl TypedArray {
            /// Creates a default-filled contiguous store.
            #[must_use]
            pub fn new(ty: ElementType, tuple_shape: Vec<usize>, component_shape: Vec<usize>) -> Self {
                match ty {
                    $(ElementType::$variant => Self::$variant(DataStore::new(tuple_shape, component_shape)),)*
                }
            }

            /// Creates a placeholder store with no payload.
            #[must_use]
            pub fn empty(ty: ElementType, tuple_shape: Vec<usize>, component_shape: Vec<usize>) -> Self {
                match ty {
                    $(ElementType::$variant => Self::$variant(DataStore::empty(tuple_shape, component_shape)),)*
                }
            }

            /// Decodes a contiguous store from little-endian bytes.
            ///
            /// # Errors
            ///
            /// Returns an error if the byte count disagrees with the shapes.
            pub fn from_bytes(
                ty: ElementType,
                tuple_shape: Vec<usize>,
                component_shape: Vec<usize>,
                bytes: &[u8],
            ) -> Result<Self> {
                match ty {
                    $(ElementType::$variant => Ok(Self::$variant(DataStore::from_vec(
                        tuple_shape,
                        component_shape,
                        <$ty as Element>::decode(bytes)?,
                    )?)),)*
                }
            }

            /// Creates a chunked store that decodes chunks from `raw` on first use.
            ///
            /// # Errors
            ///
            /// Returns an error if `chunk_shape` does not match the tuple rank.
            pub fn from_raw_chunks(
                ty: ElementType,
                tuple_shape: Vec<usize>,
                component_shape: Vec<usize>,
                chunk_shape: &[usize],
                raw: Arc<dyn RawChunkSource>,
            ) -> Result<Self> {
                match ty {
                    $(ElementType::$variant => {
                        let source: Arc<dyn ChunkSource<$ty>> = Arc::new(Decoding::<$ty> {
                            raw,
                            marker: PhantomData,
                        });
                        Ok(Self::$variant(DataStore::with_source(
                            tuple_shape,
                            component_shape,
                            chunk_shape,
                            source,
                        )?))
                    })*
                }
            }

            /// The element type.
            #[must_use]
            pub fn element_type(&self) -> ElementType {
                match self {
                    $(Self::$variant(_) => ElementType::$variant,)*
                }
            }

            /// The current tuple shape.
            #[must_use]
            pub fn tuple_shape(&self) -> Vec<usize> {
                match self {
                    $(Self::$variant(s) => s.tuple_shape(),)*
                }
            }

            /// The component shape.
            #[must_use]
            pub fn component_shape(&self) -> Vec<usize> {
                match self {
                    $(Self::$variant(s) => s.component_shape().to_vec(),)*
                }
            }

            /// Number of tuples.
            #[must_use]
            pub fn num_tuples(&self) -> usize {
                match self {
                    $(Self::$variant(s) => s.num_tuples(),)*
                }
            }

            /// Number of components per tuple.
            #[must_use]
            pub fn num_components(&self) -> usize {
                match self {
                    $(Self::$variant(s) => s.num_components(),)*
                }
            }

            /// Returns false for placeholder stores.
            #[must_use]
            pub fn is_loaded(&self) -> bool {
                match self {
                    $(Self::$variant(s) => s.is_loaded(),)*
                }
            }

            /// The chunk shape, if chunked.
            #[must_use]
            pub fn chunk_shape(&self) -> Option<Vec<usize>> {
                match self {
                    $(Self::$variant(s) => s.chunk_shape(),)*
                }
            }

            /// Number of chunks.
            #[must_use]
            pub fn chunk_count(&self) -> usize {
                match self {
                    $(Self::$variant(s) => s.chunk_count(),)*
                }
            }

            /// Changes the tuple shape.
            ///
            /// # Errors
            ///
            /// Returns an error if a lazily loaded chunk cannot be read.
            pub fn resize_tuples(&self, tuple_shape: Vec<usize>) -> Result<()> {
                match self {
                    $(Self::$variant(s) => s.resize_tuples(tuple_shape),)*
                }
            }

            /// Returns an independent copy.
            #[must_use]
            pub fn duplicate(&self) -> Self {
                match self {
                    $(Self::$variant(s) => Self::$variant(s.duplicate()),)*
                }
            }

            /// Re-partitions the payload into chunks of `chunk_shape`.
            ///
            /// # Errors
            ///
            /// Returns an error if the chunk rank disagrees with the tuple rank
            /// or the payload is unavailable.
            pub fn rechunk(&self, chunk_shape: &[usize]) -> Result<()> {
                match self {
                    $(Self::$variant(s) => s.rechunk(chunk_shape),)*
                }
            }

            /// Encodes every element in flat tuple-major order.
            ///
            /// # Errors
            ///
            /// Returns an error if the payload is unavailable.
            pub fn to_bytes(&self) -> Result<Vec<u8>> {
                let mut out = Vec::new();
                match self {
                    $(Self::$variant(s) => s.with_slice(|values| <$ty as Element>::encode(values, &mut out))?,)*
                }
                Ok(out)
            }

            /// Encodes one chunk.
            ///
            /// # Errors
            ///
            /// Returns an error if `index` is out of range or the chunk cannot be read.
            pub fn chunk_bytes(&self, index: usize) -> Result<Vec<u8>> {
                let mut out = Vec::new();
                match self {
                    $(Self::$variant(s) => <$ty as Element>::encode(&s.chunk_values(index)?, &mut out),)*
                }
                Ok(out)
            }

            /// Reads one element as `f64`.
            ///
            /// # Errors
            ///
            /// Returns an error if `index` is out of range or the payload is unavailable.
            pub fn get_f64(&self, index: usize) -> Result<f64> {
                match self {
                    $(Self::$variant(s) => s.get_flat(index).map(Element::to_f64),)*
                }
            }

            /// Bit-exact comparison; stores of different element types are unequal.
            ///
            /// # Errors
            ///
            /// Returns an error if either payload is unavailable.
            pub fn content_eq(&self, other: &TypedArray) -> Result<bool> {
                match (self, other) {
                    $((Self::$variant(a), Self::$variant(b)) => a.content_eq(b),)*
                    _ => Ok(false),
                }
            }
        }

        impl TypedList {
            /// Creates a list store of empty rows.
            #[must_use]
            pub fn new(ty: ElementType, tuple_shape: Vec<usize>) -> Self {
                match ty {
                    $(ElementType::$variant => Self::$variant(ListStore::new(tuple_shape)),)*
                }
            }

            /// Creates a placeholder list store with a row table shape but no rows.
            #[must_use]
            pub fn empty(ty: ElementType, tuple_shape: Vec<usize>) -> Self {
                match ty {
                    $(ElementType::$variant => Self::$variant(ListStore::empty(tuple_shape)),)*
                }
            }

            /// Decodes a list store from a length table and concatenated row bytes.
            ///
            /// # Errors
            ///
            /// Returns an error if the lengths disagree with the shape or the payload.
            pub fn from_flat_bytes(
                ty: ElementType,
                tuple_shape: Vec<usize>,
                lengths: &[usize],
                bytes: &[u8],
            ) -> Result<Self> {
                match ty {
                    $(ElementType::$variant => Ok(Self::$variant(ListStore::from_flat(
                        tuple_shape,
                        lengths,
                        &<$ty as Element>::decode(bytes)?,
                    )?)),)*
                }
            }

            /// The element type.
            #[must_use]
            pub fn element_type(&self) -> ElementType {
                match self {
                    $(Self::$variant(_) => ElementType::$variant,)*
                }
            }

            /// The row table shape.
            #[must_use]
            pub fn tuple_shape(&self) -> Vec<usize> {
                match self {
                    $(Self::$variant(s) => s.tuple_shape(),)*
                }
            }

            /// Number of rows.
            #[must_use]
            pub fn num_rows(&self) -> usize {
                match self {
                    $(Self::$variant(s) => s.num_rows(),)*
                }
            }

            /// Returns false for placeholder stores.
            #[must_use]
            pub fn is_loaded(&self) -> bool {
                match self {
                    $(Self::$variant(s) => s.is_loaded(),)*
                }
            }

            /// Row lengths.
            #[must_use]
            pub fn lengths(&self) -> Vec<usize> {
                match self {
                    $(Self::$variant(s) => s.lengths(),)*
                }
            }

            /// Changes the row table shape.
            pub fn resize_rows(&self, tuple_shape: Vec<usize>) {
                match self {
                    $(Self::$variant(s) => s.resize_rows(tuple_shape),)*
                }
            }

            /// Returns an independent copy.
            #[must_use]
            pub fn duplicate(&self) -> Self {
                match self {
                    $(Self::$variant(s) => Self::$variant(s.duplicate()),)*
                }
            }

            /// Encodes the concatenated rows.
            #[must_use]
            pub fn flat_bytes(&self) -> Vec<u8> {
                let mut out = Vec::new();
                match self {
                    $(Self::$variant(s) => <$ty as Element>::encode(&s.flatten(), &mut out),)*
                }
                out
            }

            /// Bit-exact comparison; stores of different element types are unequal.
            #[must_use]
            pub fn content_eq(&self, other: &TypedList) -> bool {
                match (self, other) {
                    $((Self::$variant(a), Self::$variant(b)) => a.content_eq(b),)*
                    _ => false,
                }
            }
        }
    };
}

for_each_element!(define_typed_stores);

impl TypedArray {
    /// Borrows the concrete store.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch error if the element type differs.
    pub fn as_store<T: StoreElement>(&self) -> Result<&DataStore<T>> {
        T::array(self).ok_or_else(|| Error::type_mismatch(T::TYPE.name(), self.element_type().name()))
    }

    /// Reads every element as an index.
    ///
    /// # Errors
    ///
    /// Returns an error for float or bool stores and for negative values.
    pub fn to_indices(&self) -> Result<Vec<usize>> {
        let ty = self.element_type();
        if ty.is_float() || ty == ElementType::Bool {
            return Err(Error::type_mismatch("integer", ty.name()));
        }
        let len = self.num_tuples() * self.num_components();
        (0..len)
            .map(|i| {
                let v = self.get_f64(i)?;
                if v < 0.0 {
                    return Err(Error::new(ErrorKind::InvalidFormat(format!(
                        "negative index {v} at element {i}"
                    ))));
                }
                Ok(v as usize)
            })
            .collect()
    }
}

impl<T: StoreElement> From<DataStore<T>> for TypedArray {
    fn from(store: DataStore<T>) -> Self {
        T::wrap_array(store)
    }
}

impl TypedList {
    /// Borrows the concrete store.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch error if the element type differs.
    pub fn as_store<T: StoreElement>(&self) -> Result<&ListStore<T>> {
        T::list(self).ok_or_else(|| Error::type_mismatch(T::TYPE.name(), self.element_type().name()))
    }
}

impl<T: StoreElement> From<ListStore<T>> for TypedList {
    fn from(store: ListStore<T>) -> Self {
        T::wrap_list(store)
    }
}
