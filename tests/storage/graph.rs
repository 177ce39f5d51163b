//! Integration tests for the entity graph
//!
//! Tests creation, shared ownership, the last-parent rule, renaming, and
//! path resolution.

use datagraph_foundation::{EntityId, ErrorKind};
use datagraph_storage::{DataGraph, DataStore, EntityKind, StringStore};

fn shared_graph() -> (DataGraph, EntityId, EntityId, EntityId) {
    let mut graph = DataGraph::new();
    let a = graph.create_group(EntityId::ROOT, "A").unwrap();
    let c = graph.create_group(EntityId::ROOT, "C").unwrap();
    let b = graph
        .create_array(a, "B", DataStore::<f32>::new(vec![10], vec![3]))
        .unwrap();
    graph.add_parent(b, c).unwrap();
    (graph, a, b, c)
}

// =============================================================================
// Creation
// =============================================================================

#[test]
fn ids_are_handed_out_in_order() {
    let mut graph = DataGraph::new();
    let a = graph.create_group(EntityId::ROOT, "A").unwrap();
    let b = graph.create_group(a, "B").unwrap();
    assert_eq!(a, EntityId::FIRST);
    assert_eq!(b, EntityId::new(2));
    assert_eq!(graph.next_id(), EntityId::new(3));
}

#[test]
fn sibling_names_must_be_unique() {
    let mut graph = DataGraph::new();
    graph.create_group(EntityId::ROOT, "A").unwrap();
    let err = graph.create_group(EntityId::ROOT, "A").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NameCollision { .. }));
    assert_eq!(graph.len(), 1);
}

#[test]
fn stores_cannot_hold_children() {
    let mut graph = DataGraph::new();
    let s = graph.create_strings(EntityId::ROOT, "S", StringStore::new(2)).unwrap();
    let err = graph.create_group(s, "child").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NotAContainer(_)));
}

#[test]
fn unknown_parent_is_rejected() {
    let mut graph = DataGraph::new();
    let err = graph.create_group(EntityId::new(99), "A").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownParent(_)));
}

#[test]
fn attribute_table_checks_tuple_counts() {
    let mut graph = DataGraph::new();
    let table = graph.create_attribute_table(EntityId::ROOT, "Cell Data", vec![2, 3]).unwrap();
    graph
        .create_array(table, "Phases", DataStore::<i32>::new(vec![2, 3], vec![1]))
        .unwrap();
    let err = graph
        .create_array(table, "Wrong", DataStore::<i32>::new(vec![5], vec![1]))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ShapeMismatch { .. }));
}

#[test]
fn scalars_hold_one_value() {
    let mut graph = DataGraph::new();
    let s = graph.create_scalar(EntityId::ROOT, "Count", 17u64).unwrap();
    assert_eq!(graph.scalar::<u64>(s).unwrap(), 17);
    assert_eq!(graph.kind(s), Some(EntityKind::Scalar(datagraph_foundation::ElementType::UInt64)));
    assert!(graph.scalar::<f32>(s).is_err());
}

#[test]
fn import_rejects_live_ids() {
    let mut graph = DataGraph::new();
    let id = EntityId::new(40);
    graph
        .import(EntityId::ROOT, "A", id, datagraph_storage::Payload::Group)
        .unwrap();
    assert_eq!(graph.next_id(), EntityId::new(41));
    assert!(graph
        .import(EntityId::ROOT, "B", id, datagraph_storage::Payload::Group)
        .is_err());
}

// =============================================================================
// Shared Ownership
// =============================================================================

#[test]
fn shared_entity_has_two_paths() {
    let (graph, _, b, _) = shared_graph();
    let paths: Vec<String> = graph.paths_to(b).unwrap().iter().map(ToString::to_string).collect();
    assert_eq!(paths, vec!["/A/B", "/C/B"]);
    assert_eq!(graph.resolve("A/B").unwrap(), graph.resolve("/C/B").unwrap());
}

#[test]
fn removing_one_parent_keeps_the_entity() {
    let (mut graph, a, b, c) = shared_graph();
    graph.remove(a).unwrap();
    assert!(graph.contains(b));
    assert_eq!(graph.get(b).unwrap().parent_count(), 1);
    assert_eq!(graph.children(c).unwrap(), vec![b]);
    assert!(graph.resolve("A/B").is_err());
}

#[test]
fn removing_last_parent_removes_the_entity() {
    let (mut graph, a, b, c) = shared_graph();
    graph.remove(a).unwrap();
    graph.remove(c).unwrap();
    assert!(!graph.contains(b));
    assert!(graph.is_empty());
}

#[test]
fn remove_parent_on_last_parent_removes() {
    let (mut graph, a, b, c) = shared_graph();
    graph.remove_parent(b, a).unwrap();
    assert!(graph.contains(b));
    graph.remove_parent(b, c).unwrap();
    assert!(!graph.contains(b));
}

#[test]
fn cycles_are_rejected() {
    let mut graph = DataGraph::new();
    let a = graph.create_group(EntityId::ROOT, "A").unwrap();
    let b = graph.create_group(a, "B").unwrap();
    let err = graph.add_parent(a, b).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Cycle { .. }));
    assert!(matches!(graph.add_parent(a, a).unwrap_err().kind, ErrorKind::Cycle { .. }));
}

#[test]
fn add_parent_twice_is_a_no_op() {
    let (mut graph, a, b, _) = shared_graph();
    graph.add_parent(b, a).unwrap();
    assert_eq!(graph.get(b).unwrap().parent_count(), 2);
}

#[test]
fn clones_share_stores() {
    let (graph, _, b, _) = shared_graph();
    let copy = graph.clone();
    graph.array(b).unwrap().resize_tuples(vec![20]).unwrap();
    assert_eq!(copy.array(b).unwrap().num_tuples(), 20);

    let deep = graph.deep_copy();
    graph.array(b).unwrap().resize_tuples(vec![5]).unwrap();
    assert_eq!(deep.array(b).unwrap().num_tuples(), 20);
}

// =============================================================================
// Renaming and Paths
// =============================================================================

#[test]
fn rename_updates_every_parent() {
    let (mut graph, _, b, _) = shared_graph();
    graph.rename(b, "Renamed").unwrap();
    assert_eq!(graph.resolve("A/Renamed").unwrap(), b);
    assert_eq!(graph.resolve("C/Renamed").unwrap(), b);
    assert!(graph.resolve("A/B").is_err());
}

#[test]
fn rename_collision_changes_nothing() {
    let (mut graph, _, b, c) = shared_graph();
    graph.create_group(c, "Taken").unwrap();
    let err = graph.rename(b, "Taken").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NameCollision { .. }));
    assert_eq!(graph.get(b).unwrap().name(), "B");
    assert_eq!(graph.resolve("A/B").unwrap(), b);
}

#[test]
fn missing_path_is_reported() {
    let (graph, ..) = shared_graph();
    let err = graph.resolve("A/Missing").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::PathNotFound(_)));
    assert!(graph.resolve("/").is_err());
}

// =============================================================================
// Attribute Tables
// =============================================================================

#[test]
fn resizing_a_table_resizes_its_stores() {
    let mut graph = DataGraph::new();
    let table = graph.create_attribute_table(EntityId::ROOT, "Cells", vec![4]).unwrap();
    let arr = graph
        .create_array(table, "Values", DataStore::from_vec(vec![4], vec![1], vec![1u8, 2, 3, 4]).unwrap())
        .unwrap();
    let names = graph
        .create_strings(table, "Names", StringStore::from_vec(vec!["a".into(); 4]))
        .unwrap();
    graph.resize_attribute_table(table, vec![6]).unwrap();
    assert_eq!(graph.attribute_table(table).unwrap().num_tuples(), 6);
    assert_eq!(graph.array(arr).unwrap().num_tuples(), 6);
    assert_eq!(graph.strings(names).unwrap().len(), 6);
    let values = graph.array(arr).unwrap().as_store::<u8>().unwrap().to_vec().unwrap();
    assert_eq!(values, vec![1, 2, 3, 4, 0, 0]);
}
