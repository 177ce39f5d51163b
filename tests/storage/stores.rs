//! Integration tests for array, list, and string stores
//!
//! Tests shapes, chunked and lazy backings, resizing, and the type-erased
//! wrappers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use datagraph_foundation::{ElementType, Error, ErrorKind, Result};
use datagraph_storage::{ChunkSource, DataStore, ListStore, RawChunkSource, StringStore, TypedArray, TypedList};
use proptest::prelude::*;

#[derive(Debug)]
struct Counting {
    reads: AtomicUsize,
}

impl ChunkSource<u16> for Counting {
    fn read_chunk(&self, index: usize) -> Result<Vec<u16>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let base = u16::try_from(index * 4).map_err(|e| Error::invalid_format(e.to_string()))?;
        Ok((base..base + 4).collect())
    }
}

#[derive(Debug)]
struct Broken;

impl RawChunkSource for Broken {
    fn read_chunk_bytes(&self, _index: usize) -> Result<Vec<u8>> {
        Err(Error::io("device went away"))
    }
}

// =============================================================================
// Array Stores
// =============================================================================

#[test]
fn array_indexing() {
    let store = DataStore::from_vec(vec![2], vec![3], vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    assert_eq!(store.num_tuples(), 2);
    assert_eq!(store.num_components(), 3);
    assert_eq!(store.get(1, 2).unwrap(), 6.0);
    assert_eq!(store.tuple(0).unwrap(), vec![1.0, 2.0, 3.0]);
    assert!(matches!(store.get(2, 0).unwrap_err().kind, ErrorKind::IndexOutOfRange { .. }));
}

#[test]
fn from_vec_checks_length() {
    let err = DataStore::from_vec(vec![3], vec![2], vec![0i8; 5]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ShapeMismatch { .. }));
}

#[test]
fn chunked_store_reads_like_contiguous() {
    let values: Vec<i32> = (0..30).collect();
    let contiguous = DataStore::from_vec(vec![5, 3], vec![2], values.clone()).unwrap();
    let chunked = DataStore::<i32>::chunked(vec![5, 3], vec![2], &[2, 2]).unwrap();
    for (i, v) in values.iter().enumerate() {
        chunked.set_flat(i, *v).unwrap();
    }
    assert_eq!(chunked.chunk_count(), 6);
    assert_eq!(chunked.to_vec().unwrap(), values);
    assert!(chunked.content_eq(&contiguous).unwrap());
}

#[test]
fn lazy_chunks_load_on_first_touch() {
    let source = Arc::new(Counting { reads: AtomicUsize::new(0) });
    let store = DataStore::<u16>::with_source(vec![12], vec![1], &[4], source.clone()).unwrap();
    assert!(!store.is_chunk_loaded(1));
    assert_eq!(store.get(5, 0).unwrap(), 5);
    assert!(store.is_chunk_loaded(1));
    assert!(!store.is_chunk_loaded(0));
    store.get(6, 0).unwrap();
    assert_eq!(source.reads.load(Ordering::SeqCst), 1);
    assert_eq!(store.to_vec().unwrap(), (0..12).collect::<Vec<u16>>());
    assert_eq!(source.reads.load(Ordering::SeqCst), 3);
}

#[test]
fn failing_chunk_source_surfaces_the_error() {
    let store = TypedArray::from_raw_chunks(ElementType::Float64, vec![8], vec![1], &[4], Arc::new(Broken)).unwrap();
    assert!(store.get_f64(0).is_err());
}

#[test]
fn resize_keeps_prefix_and_drops_chunking() {
    let store = DataStore::<u32>::chunked(vec![6], vec![1], &[4]).unwrap();
    store.fill(9).unwrap();
    store.resize_tuples(vec![8]).unwrap();
    assert_eq!(store.chunk_shape(), None);
    assert_eq!(store.to_vec().unwrap(), vec![9, 9, 9, 9, 9, 9, 0, 0]);
}

#[test]
fn rechunk_keeps_contents() {
    let store = DataStore::from_vec(vec![10], vec![1], (0..10u64).collect()).unwrap();
    store.rechunk(&[3]).unwrap();
    assert_eq!(store.chunk_shape(), Some(vec![3]));
    assert_eq!(store.chunk_count(), 4);
    assert_eq!(store.chunk_values(3).unwrap(), vec![9]);
    store.make_contiguous().unwrap();
    assert_eq!(store.chunk_shape(), None);
    assert_eq!(store.to_vec().unwrap(), (0..10).collect::<Vec<u64>>());
}

#[test]
fn placeholder_has_shape_but_no_payload() {
    let store = DataStore::<f32>::empty(vec![4], vec![3]);
    assert!(!store.is_loaded());
    assert_eq!(store.num_tuples(), 4);
    assert!(matches!(store.get(0, 0).unwrap_err().kind, ErrorKind::PayloadNotLoaded(_)));
}

#[test]
fn duplicate_is_independent() {
    let store = DataStore::from_vec(vec![2], vec![1], vec![1i64, 2]).unwrap();
    let copy = store.duplicate();
    store.set(0, 0, 10).unwrap();
    assert_eq!(copy.get(0, 0).unwrap(), 1);
}

// =============================================================================
// Type-Erased Arrays
// =============================================================================

#[test]
fn typed_array_bytes() {
    let store = TypedArray::from_bytes(ElementType::UInt16, vec![2], vec![1], &[1, 0, 2, 1]).unwrap();
    assert_eq!(store.element_type(), ElementType::UInt16);
    assert_eq!(store.as_store::<u16>().unwrap().to_vec().unwrap(), vec![1, 258]);
    assert_eq!(store.to_bytes().unwrap(), vec![1, 0, 2, 1]);
    assert!(matches!(store.as_store::<i16>().unwrap_err().kind, ErrorKind::TypeMismatch { .. }));
}

#[test]
fn typed_array_indices() {
    let ints: TypedArray = DataStore::from_vec(vec![3], vec![1], vec![0i32, 4, 2]).unwrap().into();
    assert_eq!(ints.to_indices().unwrap(), vec![0, 4, 2]);
    let negative: TypedArray = DataStore::from_vec(vec![1], vec![1], vec![-1i8]).unwrap().into();
    assert!(negative.to_indices().is_err());
    let floats: TypedArray = DataStore::from_vec(vec![1], vec![1], vec![1.0f32]).unwrap().into();
    assert!(floats.to_indices().is_err());
}

#[test]
fn bool_arrays() {
    let store: TypedArray = DataStore::from_vec(vec![3], vec![1], vec![true, false, true]).unwrap().into();
    assert_eq!(store.element_type(), ElementType::Bool);
    assert_eq!(store.to_bytes().unwrap(), vec![1, 0, 1]);
}

// =============================================================================
// Lists and Strings
// =============================================================================

#[test]
fn list_rows() {
    let list = ListStore::from_rows(vec![3], &[vec![1i32, 2], vec![], vec![7]]).unwrap();
    assert_eq!(list.num_rows(), 3);
    assert_eq!(list.lengths(), vec![2, 0, 1]);
    assert_eq!(list.flatten(), vec![1, 2, 7]);
    list.push(1, 5).unwrap();
    assert_eq!(list.row(1).unwrap(), vec![5]);
    assert!(list.get(2, 1).is_err());
}

#[test]
fn list_from_flat_checks_lengths() {
    assert!(ListStore::from_flat(vec![2], &[1, 1], &[3u8, 4]).is_ok());
    assert!(ListStore::from_flat(vec![2], &[1, 2], &[3u8, 4]).is_err());
    assert!(ListStore::from_flat(vec![3], &[1, 1], &[3u8, 4]).is_err());
}

#[test]
fn typed_list_round_trips_bytes() {
    let list: TypedList = ListStore::from_rows(vec![2], &[vec![1.5f64], vec![2.5, 3.5]]).unwrap().into();
    let back = TypedList::from_flat_bytes(ElementType::Float64, vec![2], &list.lengths(), &list.flat_bytes()).unwrap();
    assert!(list.content_eq(&back));
}

#[test]
fn string_store() {
    let strings = StringStore::from_vec(vec!["x".into(), "y".into()]);
    strings.set(1, "z").unwrap();
    assert_eq!(strings.to_vec(), vec!["x", "z"]);
    assert!(strings.get(2).is_err());
    strings.resize(3);
    assert_eq!(strings.get(2).unwrap(), "");
}

proptest! {
    #[test]
    fn any_chunking_preserves_contents(
        rows in 1usize..12,
        cols in 1usize..12,
        chunk_rows in 1usize..6,
        chunk_cols in 1usize..6,
    ) {
        let values: Vec<u32> = (0..u32::try_from(rows * cols * 2).unwrap()).collect();
        let store = DataStore::from_vec(vec![rows, cols], vec![2], values.clone()).unwrap();
        store.rechunk(&[chunk_rows, chunk_cols]).unwrap();
        prop_assert_eq!(store.to_vec().unwrap(), values);
    }
}
