//! Integration tests for read and write failures
//!
//! Tests unknown content, missing metadata, version checks, non-importable
//! objects, and atomic replacement.

use std::fs;
use std::path::Path;

use datagraph_container::ContainerWriter;
use datagraph_foundation::{EntityId, ErrorCategory, ErrorKind};
use datagraph_io::constants::{
    CURRENT_VERSION, DATA_STRUCTURE, FILE_VERSION, IMPORTABLE, NEXT_OBJECT_ID, OBJECT_ID, OBJECT_TYPE,
};
use datagraph_io::{
    FileVersion, WriteOptions, file_version, is_unknown_content, read_file, write_file, write_file_with,
};
use datagraph_storage::{DataGraph, DataStore, ListStore, StringStore};

/// Writes a current-layout file holding one group with the given
/// attributes.
fn write_single_object(path: &Path, object_type: Option<&str>, object_id: Option<u64>) {
    let mut container = ContainerWriter::create(path).unwrap();
    let root = container.root();
    container.set_attribute(root, FILE_VERSION, CURRENT_VERSION).unwrap();
    let structure = container.create_group(root, DATA_STRUCTURE).unwrap();
    container.set_attribute(structure, NEXT_OBJECT_ID, 2u64).unwrap();
    let object = container.create_group(structure, "Thing").unwrap();
    container.set_attribute(object, IMPORTABLE, 1i32).unwrap();
    if let Some(object_type) = object_type {
        container.set_attribute(object, OBJECT_TYPE, object_type).unwrap();
    }
    if let Some(id) = object_id {
        container.set_attribute(object, OBJECT_ID, id).unwrap();
    }
    container.finish().unwrap();
}

// =============================================================================
// Unknown and Missing Content
// =============================================================================

#[test]
fn unknown_type_fails_the_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mystery.dgraph");
    write_single_object(&path, Some("Mystery"), Some(1));

    let err = read_file(&path).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownType(ref name) if name == "Mystery"));
    assert_eq!(err.category(), ErrorCategory::Format);
    assert!(is_unknown_content(&err));
    let object = err.context.and_then(|ctx| ctx.object);
    assert_eq!(object.as_deref(), Some("/DataStructure/Thing"));
}

#[test]
fn missing_object_id_fails_the_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("noid.dgraph");
    write_single_object(&path, Some("DataGroup"), None);

    let err = read_file(&path).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::MissingMetadata { ref attribute, .. } if attribute == OBJECT_ID));
}

#[test]
fn well_formed_single_object_reads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ok.dgraph");
    write_single_object(&path, Some("DataGroup"), Some(1));
    let graph = read_file(&path).unwrap();
    assert_eq!(graph.resolve("Thing").unwrap(), EntityId::new(1));
    assert_eq!(graph.next_id(), EntityId::new(2));
}

#[test]
fn missing_version_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bare.dgraph");
    let container = ContainerWriter::create(&path).unwrap();
    container.finish().unwrap();

    let err = file_version(&path).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::MissingMetadata { .. }));
    assert!(read_file(&path).is_err());
}

#[test]
fn unknown_version_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.dgraph");
    let mut container = ContainerWriter::create(&path).unwrap();
    let root = container.root();
    container.set_attribute(root, FILE_VERSION, "12.0").unwrap();
    container.finish().unwrap();

    let err = read_file(&path).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::VersionMismatch { .. }));
    assert!(!is_unknown_content(&err));
}

#[test]
fn not_a_container_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.dgraph");
    fs::write(&path, b"this is not a container").unwrap();
    assert!(read_file(&path).is_err());
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_file(dir.path().join("absent.dgraph")).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Io);
}

// =============================================================================
// Non-Importable Objects
// =============================================================================

#[test]
fn non_importable_parent_is_skipped_but_shared_child_survives() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("skip.dgraph");
    let mut graph = DataGraph::new();
    let a = graph.create_group(EntityId::ROOT, "A").unwrap();
    let c = graph.create_group(EntityId::ROOT, "C").unwrap();
    let b = graph
        .create_array(a, "B", DataStore::from_vec(vec![2], vec![1], vec![7u8, 8]).unwrap())
        .unwrap();
    graph.add_parent(b, c).unwrap();
    graph.create_group(a, "OnlyInA").unwrap();
    graph.set_importable(a, false).unwrap();
    write_file(&graph, &path).unwrap();

    let back = read_file(&path).unwrap();
    assert!(!back.contains(a));
    assert!(back.resolve("A/OnlyInA").is_err());
    assert_eq!(back.get(b).unwrap().parent_count(), 1);
    assert_eq!(back.resolve("C/B").unwrap(), b);
    assert_eq!(back.array(b).unwrap().as_store::<u8>().unwrap().to_vec().unwrap(), vec![7, 8]);
}

// =============================================================================
// Atomic Writes
// =============================================================================

fn colliding_graph() -> DataGraph {
    let mut graph = DataGraph::new();
    graph
        .create_list(EntityId::ROOT, "Neighbors", ListStore::<u32>::new(vec![3]))
        .unwrap();
    graph
        .create_strings(EntityId::ROOT, "Neighbors_NumNeighbors", StringStore::new(1))
        .unwrap();
    graph
}

#[test]
fn failed_write_leaves_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stable.dgraph");
    let mut good = DataGraph::new();
    good.create_group(EntityId::ROOT, "Original").unwrap();
    write_file(&good, &path).unwrap();
    let before = fs::read(&path).unwrap();

    let err = write_file(&colliding_graph(), &path).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NameCollision { .. }));
    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    assert_eq!(file_version(&path).unwrap(), FileVersion::Current);
    assert!(read_file(&path).unwrap().resolve("Original").is_ok());
}

#[test]
fn non_atomic_write_goes_straight_to_the_target() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("direct.dgraph");
    let mut graph = DataGraph::new();
    graph.create_scalar(EntityId::ROOT, "Answer", 42i32).unwrap();
    write_file_with(&graph, &path, &WriteOptions::default().with_atomic(false)).unwrap();
    let back = read_file(&path).unwrap();
    let id = back.resolve("Answer").unwrap();
    assert_eq!(back.scalar::<i32>(id).unwrap(), 42);
}
