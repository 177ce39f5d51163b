//! Integration tests for legacy import
//!
//! Tests conversion of the legacy data-container layout and that a
//! converted graph survives a round trip through the current layout.

use std::io::{Seek, Write};
use std::path::Path;

use datagraph_container::{ContainerWriter, ObjectRef};
use datagraph_foundation::{ElementType, EntityId, ErrorKind};
use datagraph_io::constants::legacy::{
    ATTRIBUTE_MATRIX_TYPE, BOOL_ARRAY, CELL_MATRIX, COMPONENT_DIMENSIONS, DATA_CONTAINERS, DIMENSIONS, GEOMETRY_GROUP,
    GEOMETRY_TYPE_NAME, ORIGIN, SHARED_TRI_LIST, SHARED_VERTEX_LIST, SPACING, VERTEX_MATRIX,
};
use datagraph_io::constants::{FILE_VERSION, LEGACY_VERSION, LINKED_NUM_NEIGHBORS, OBJECT_TYPE, TUPLE_DIMENSIONS};
use datagraph_io::{FileVersion, file_version, read_file, read_file_preflight, write_file};
use datagraph_storage::{
    DataGraph, DataStore, Geometry, GeometryKind, GeometryRole, GridSpec, ListStore, StringStore, graph_diff,
};

fn i32_bytes(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn tag_array<W: Write + Seek>(w: &mut ContainerWriter<W>, object: ObjectRef, ty: &str, tuples: Vec<u64>, comps: Vec<u64>) {
    w.set_attribute(object, OBJECT_TYPE, ty).unwrap();
    w.set_attribute(object, TUPLE_DIMENSIONS, tuples).unwrap();
    w.set_attribute(object, COMPONENT_DIMENSIONS, comps).unwrap();
}

/// A legacy file with an image holding cell data and neighbor lists, and a
/// triangle mesh holding vertex data.
fn write_legacy_file(path: &Path) {
    let mut w = ContainerWriter::create(path).unwrap();
    let root = w.root();
    w.set_attribute(root, FILE_VERSION, LEGACY_VERSION).unwrap();
    let dcs = w.create_group(root, DATA_CONTAINERS).unwrap();

    let image = w.create_group(dcs, "ImageDataContainer").unwrap();
    let geom = w.create_group(image, GEOMETRY_GROUP).unwrap();
    w.set_attribute(geom, GEOMETRY_TYPE_NAME, "ImageGeometry").unwrap();
    let dims: Vec<u8> = [3i64, 2, 1].iter().flat_map(|v| v.to_le_bytes()).collect();
    w.write_dataset(geom, DIMENSIONS, ElementType::Int64, &[3], &dims).unwrap();
    w.write_dataset(geom, ORIGIN, ElementType::Float32, &[3], &f32_bytes(&[0.0, 0.0, 0.0]))
        .unwrap();
    w.write_dataset(geom, SPACING, ElementType::Float32, &[3], &f32_bytes(&[1.0, 1.0, 1.0]))
        .unwrap();

    let cells = w.create_group(image, "CellData").unwrap();
    w.set_attribute(cells, TUPLE_DIMENSIONS, vec![3u64, 2, 1]).unwrap();
    w.set_attribute(cells, ATTRIBUTE_MATRIX_TYPE, CELL_MATRIX).unwrap();
    let phases = w
        .write_dataset(cells, "Phases", ElementType::Int32, &[1, 2, 3, 1], &i32_bytes(&[1, 1, 2, 2, 3, 3]))
        .unwrap();
    tag_array(&mut w, phases, "DataArray<int32>", vec![3, 2, 1], vec![1]);
    let mask = w
        .write_dataset(cells, "Mask", ElementType::UInt8, &[1, 2, 3, 1], &[1, 0, 1, 1, 0, 0])
        .unwrap();
    tag_array(&mut w, mask, BOOL_ARRAY, vec![3, 2, 1], vec![1]);
    let counts = w
        .write_dataset(cells, "NumNeighbors", ElementType::Int32, &[1, 2, 3, 1], &i32_bytes(&[1, 2, 0, 1, 0, 1]))
        .unwrap();
    tag_array(&mut w, counts, "DataArray<int32>", vec![3, 2, 1], vec![1]);
    let flat = w
        .write_dataset(cells, "Neighbors", ElementType::Int32, &[5], &i32_bytes(&[1, 0, 2, 4, 3]))
        .unwrap();
    tag_array(&mut w, flat, "NeighborList<int32>", vec![3, 2, 1], vec![1]);
    w.set_attribute(flat, LINKED_NUM_NEIGHBORS, "NumNeighbors").unwrap();

    let mesh = w.create_group(dcs, "TriangleDataContainer").unwrap();
    let geom = w.create_group(mesh, GEOMETRY_GROUP).unwrap();
    w.set_attribute(geom, GEOMETRY_TYPE_NAME, "TriangleGeometry").unwrap();
    let verts = w
        .write_dataset(geom, SHARED_VERTEX_LIST, ElementType::Float32, &[4, 3], &f32_bytes(&[0.5; 12]))
        .unwrap();
    tag_array(&mut w, verts, "DataArray<float>", vec![4], vec![3]);
    let tris = w
        .write_dataset(geom, SHARED_TRI_LIST, ElementType::Int32, &[2, 3], &i32_bytes(&[0, 1, 2, 1, 3, 2]))
        .unwrap();
    tag_array(&mut w, tris, "DataArray<int32_t>", vec![2], vec![3]);
    let vertex_data = w.create_group(mesh, "VertexData").unwrap();
    w.set_attribute(vertex_data, TUPLE_DIMENSIONS, vec![4u64]).unwrap();
    w.set_attribute(vertex_data, ATTRIBUTE_MATRIX_TYPE, VERTEX_MATRIX).unwrap();
    let labels = w
        .write_strings(vertex_data, "Labels", &["a".into(), "b".into(), "c".into(), "d".into()])
        .unwrap();
    tag_array(&mut w, labels, "StringDataArray", vec![4], vec![1]);

    w.finish().unwrap();
}

#[test]
fn legacy_file_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.dream3d");
    write_legacy_file(&path);
    assert_eq!(file_version(&path).unwrap(), FileVersion::Legacy);
}

/// The data set of [`write_legacy_file`] built directly, in the order the
/// importer visits it: containers, then matrices, then arrays, each by name.
fn expected_graph() -> DataGraph {
    let mut graph = DataGraph::new();

    let grid = GridSpec {
        dimensions: [3, 2, 1],
        origin: [0.0; 3],
        spacing: [1.0; 3],
    };
    let image = graph
        .create_geometry(EntityId::ROOT, "ImageDataContainer", Geometry::new(GeometryKind::Image).with_grid(grid))
        .unwrap();
    let cells = graph.create_attribute_table(image, "CellData", vec![1, 2, 3]).unwrap();
    let mask = vec![true, false, true, true, false, false];
    graph
        .create_array(cells, "Mask", DataStore::from_vec(vec![1, 2, 3], vec![1], mask).unwrap())
        .unwrap();
    let rows = [vec![1i32], vec![0, 2], vec![], vec![4], vec![], vec![3]];
    graph
        .create_list(cells, "Neighbors", ListStore::from_rows(vec![6], &rows).unwrap())
        .unwrap();
    let counts = vec![1i32, 2, 0, 1, 0, 1];
    graph
        .create_array(cells, "NumNeighbors", DataStore::from_vec(vec![1, 2, 3], vec![1], counts).unwrap())
        .unwrap();
    let phases = vec![1i32, 1, 2, 2, 3, 3];
    graph
        .create_array(cells, "Phases", DataStore::from_vec(vec![1, 2, 3], vec![1], phases).unwrap())
        .unwrap();
    graph
        .geometry_mut(image)
        .unwrap()
        .set_reference(GeometryRole::CellData, Some(cells));

    let mesh = graph
        .create_geometry(EntityId::ROOT, "TriangleDataContainer", Geometry::new(GeometryKind::Triangle))
        .unwrap();
    let verts = DataStore::from_vec(vec![4], vec![3], vec![0.5f32; 12]).unwrap();
    let verts = graph.create_array(mesh, SHARED_VERTEX_LIST, verts).unwrap();
    let tris = DataStore::from_vec(vec![2], vec![3], vec![0u64, 1, 2, 1, 3, 2]).unwrap();
    let tris = graph.create_array(mesh, SHARED_TRI_LIST, tris).unwrap();
    let vertex_data = graph.create_attribute_table(mesh, "VertexData", vec![4]).unwrap();
    let labels = StringStore::from_vec(vec!["a".into(), "b".into(), "c".into(), "d".into()]);
    graph.create_strings(vertex_data, "Labels", labels).unwrap();
    let geometry = graph.geometry_mut(mesh).unwrap();
    geometry.set_reference(GeometryRole::SharedVertices, Some(verts));
    geometry.set_reference(GeometryRole::SharedFaces, Some(tris));
    geometry.set_reference(GeometryRole::VertexData, Some(vertex_data));
    graph
}

#[test]
fn legacy_import_converges_with_current_layout() {
    let dir = tempfile::tempdir().unwrap();
    let legacy = dir.path().join("old.dream3d");
    write_legacy_file(&legacy);
    let imported = read_file(&legacy).unwrap();

    let expected = expected_graph();
    assert_eq!(graph_diff(&expected, &imported, true).unwrap(), None);

    let current = dir.path().join("same.dgraph");
    write_file(&expected, &current).unwrap();
    let native = read_file(&current).unwrap();
    assert_eq!(graph_diff(&native, &imported, true).unwrap(), None);

    let mask = imported.resolve("ImageDataContainer/CellData/Mask").unwrap();
    assert_eq!(imported.array(mask).unwrap().element_type(), ElementType::Bool);
    assert_eq!(imported.array(mask).unwrap().tuple_shape(), vec![1, 2, 3]);
}

#[test]
fn legacy_image_is_imported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.dream3d");
    write_legacy_file(&path);
    let graph = read_file(&path).unwrap();

    let image = graph.resolve("ImageDataContainer").unwrap();
    let geometry = graph.geometry(image).unwrap();
    assert_eq!(geometry.kind(), GeometryKind::Image);
    assert_eq!(geometry.grid().unwrap().dimensions, [3, 2, 1]);
    let cells = graph.resolve("ImageDataContainer/CellData").unwrap();
    assert_eq!(geometry.reference(GeometryRole::CellData), Some(cells));
    assert_eq!(graph.attribute_table(cells).unwrap().tuple_shape(), &[1, 2, 3]);
    graph.validate_geometry(image).unwrap();

    let neighbors = graph.resolve("ImageDataContainer/CellData/Neighbors").unwrap();
    let rows = graph.list(neighbors).unwrap().as_store::<i32>().unwrap().to_rows();
    assert_eq!(rows, vec![vec![1], vec![0, 2], vec![], vec![4], vec![], vec![3]]);
}

#[test]
fn legacy_mesh_is_imported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.dream3d");
    write_legacy_file(&path);
    let graph = read_file(&path).unwrap();

    let mesh = graph.resolve("TriangleDataContainer").unwrap();
    assert_eq!(graph.number_of_vertices(mesh).unwrap(), 4);
    assert_eq!(graph.number_of_cells(mesh).unwrap(), 2);
    let faces = graph.geometry_array(mesh, GeometryRole::SharedFaces).unwrap();
    assert_eq!(faces.element_type(), ElementType::UInt64);
    let vertex_data = graph.resolve("TriangleDataContainer/VertexData").unwrap();
    assert_eq!(
        graph.geometry_reference(mesh, GeometryRole::VertexData).unwrap(),
        Some(vertex_data)
    );
    let labels = graph.resolve("TriangleDataContainer/VertexData/Labels").unwrap();
    assert_eq!(graph.strings(labels).unwrap().to_vec(), vec!["a", "b", "c", "d"]);
    graph.validate_geometry(mesh).unwrap();
}

#[test]
fn converted_graph_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let legacy = dir.path().join("old.dream3d");
    write_legacy_file(&legacy);
    let imported = read_file(&legacy).unwrap();

    let current = dir.path().join("new.dgraph");
    write_file(&imported, &current).unwrap();
    assert_eq!(file_version(&current).unwrap(), FileVersion::Current);
    let back = read_file(&current).unwrap();
    assert_eq!(graph_diff(&imported, &back, true).unwrap(), None);
}

#[test]
fn legacy_preflight_matches_full_import() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.dream3d");
    write_legacy_file(&path);
    let full = read_file(&path).unwrap();
    let shell = read_file_preflight(&path).unwrap();
    assert_eq!(graph_diff(&full, &shell, false).unwrap(), None);
    let phases = shell.resolve("ImageDataContainer/CellData/Phases").unwrap();
    assert!(!shell.array(phases).unwrap().is_loaded());
}

#[test]
fn legacy_file_without_data_containers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.dream3d");
    let mut w = ContainerWriter::create(&path).unwrap();
    let root = w.root();
    w.set_attribute(root, FILE_VERSION, LEGACY_VERSION).unwrap();
    w.finish().unwrap();

    let err = read_file(&path).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::MissingMetadata { ref attribute, .. } if attribute == DATA_CONTAINERS));
}
