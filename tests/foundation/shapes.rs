//! Integration tests for shape arithmetic and chunk grids

use datagraph_foundation::{ChunkGrid, flat_index, shape_len, unflatten};
use proptest::prelude::*;

#[test]
fn empty_shape_is_one_element() {
    assert_eq!(shape_len(&[]), 1);
    assert_eq!(shape_len(&[2, 3, 4]), 24);
    assert_eq!(shape_len(&[5, 0]), 0);
}

#[test]
fn flat_index_is_row_major() {
    assert_eq!(flat_index(&[1, 2], &[3, 4]), 6);
    assert_eq!(unflatten(6, &[3, 4]), vec![1, 2]);
}

#[test]
fn grid_clips_edge_chunks() {
    let grid = ChunkGrid::new(&[10, 7], &[4, 4]).unwrap();
    assert_eq!(grid.grid(), &[3, 2]);
    assert_eq!(grid.count(), 6);
    assert_eq!(grid.extent(5).unwrap(), vec![2, 3]);
    assert_eq!(grid.chunk_tuples(0).unwrap(), 16);
}

#[test]
fn grid_rejects_bad_chunks() {
    assert!(ChunkGrid::new(&[10], &[0]).is_err());
    assert!(ChunkGrid::new(&[10, 10], &[5]).is_err());
}

#[test]
fn chunk_out_of_range() {
    let grid = ChunkGrid::new(&[4], &[2]).unwrap();
    assert!(grid.bounds(2).is_err());
    assert!(grid.locate(4).is_err());
}

#[test]
fn runs_cover_the_chunk() {
    let grid = ChunkGrid::new(&[6, 5], &[4, 3]).unwrap();
    for index in 0..grid.count() {
        let covered: usize = grid.runs(index).unwrap().iter().map(|r| r.len).sum();
        assert_eq!(covered, grid.chunk_tuples(index).unwrap());
    }
}

proptest! {
    #[test]
    fn locate_lands_inside_its_chunk(
        rows in 1usize..20,
        cols in 1usize..20,
        chunk_rows in 1usize..8,
        chunk_cols in 1usize..8,
    ) {
        let grid = ChunkGrid::new(&[rows, cols], &[chunk_rows, chunk_cols]).unwrap();
        for tuple in 0..rows * cols {
            let (chunk, offset) = grid.locate(tuple).unwrap();
            prop_assert!(chunk < grid.count());
            prop_assert!(offset < grid.chunk_tuples(chunk).unwrap());
        }
    }

    #[test]
    fn unflatten_inverts_flat_index(dims in prop::collection::vec(1usize..6, 1..4), seed in any::<usize>()) {
        let flat = seed % shape_len(&dims);
        prop_assert_eq!(flat_index(&unflatten(flat, &dims), &dims), flat);
    }
}
