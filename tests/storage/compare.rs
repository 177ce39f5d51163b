//! Integration tests for graph comparison

use datagraph_foundation::EntityId;
use datagraph_storage::{DataGraph, DataStore, Geometry, GeometryKind, GeometryRole, GridSpec, graph_diff};

fn sample() -> (DataGraph, EntityId, EntityId) {
    let mut graph = DataGraph::new();
    let grid = GridSpec::with_dimensions([2, 2, 1]);
    let geom = graph.create_geometry(EntityId::ROOT, "Image", Geometry::image(grid)).unwrap();
    let cells = graph.create_attribute_table(geom, "Cell Data", grid.cell_tuple_shape()).unwrap();
    graph
        .create_array(cells, "Phases", DataStore::from_vec(vec![1, 2, 2], vec![1], vec![1i32, 2, 3, 4]).unwrap())
        .unwrap();
    graph
        .geometry_mut(geom)
        .unwrap()
        .set_reference(GeometryRole::CellData, Some(cells));
    (graph, geom, cells)
}

#[test]
fn a_graph_equals_its_deep_copy() {
    let (graph, ..) = sample();
    assert_eq!(graph_diff(&graph, &graph.deep_copy(), true).unwrap(), None);
}

#[test]
fn extra_parent_is_a_difference() {
    let (graph, _, cells) = sample();
    let mut other = graph.deep_copy();
    let group = other.create_group(EntityId::ROOT, "Shared").unwrap();
    other.add_parent(cells, group).unwrap();
    assert!(graph_diff(&graph, &other, false).unwrap().is_some());
}

#[test]
fn geometry_metadata_is_compared() {
    let (graph, geom, _) = sample();
    let mut other = graph.deep_copy();
    other
        .geometry_mut(geom)
        .unwrap()
        .set_grid(Some(GridSpec::with_dimensions([4, 1, 1])));
    let diff = graph_diff(&graph, &other, false).unwrap().unwrap();
    assert_eq!(diff.id, Some(geom));
}

#[test]
fn geometry_kind_is_compared() {
    let mut a = DataGraph::new();
    a.create_geometry(EntityId::ROOT, "G", Geometry::new(GeometryKind::Triangle))
        .unwrap();
    let mut b = DataGraph::new();
    b.create_geometry(EntityId::ROOT, "G", Geometry::new(GeometryKind::Quad))
        .unwrap();
    let diff = graph_diff(&a, &b, false).unwrap().unwrap();
    assert!(diff.to_string().contains("kind"));
}
