//! Integration tests for geometries
//!
//! Tests references, element counts, derived topology lists, and
//! validation.

use std::collections::HashSet;

use datagraph_foundation::{EntityId, ErrorKind};
use datagraph_storage::{
    DataGraph, DataStore, Geometry, GeometryCapabilities, GeometryKind, GeometryRole, GridSpec,
};

/// Two triangles sharing the edge 1-2.
fn triangle_pair() -> (DataGraph, EntityId) {
    let mut graph = DataGraph::new();
    let geom = graph
        .create_geometry(EntityId::ROOT, "Surface", Geometry::new(GeometryKind::Triangle))
        .unwrap();
    let verts = DataStore::from_vec(
        vec![4],
        vec![3],
        vec![0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0],
    )
    .unwrap();
    let verts = graph.create_array(geom, "SharedVertexList", verts).unwrap();
    let tris = DataStore::from_vec(vec![2], vec![3], vec![0u64, 1, 2, 1, 3, 2]).unwrap();
    let tris = graph.create_array(geom, "SharedTriList", tris).unwrap();
    let g = graph.geometry_mut(geom).unwrap();
    g.set_reference(GeometryRole::SharedVertices, Some(verts));
    g.set_reference(GeometryRole::SharedFaces, Some(tris));
    (graph, geom)
}

// =============================================================================
// Counts
// =============================================================================

#[test]
fn node_geometry_counts() {
    let (graph, geom) = triangle_pair();
    assert_eq!(graph.number_of_vertices(geom).unwrap(), 4);
    assert_eq!(graph.number_of_cells(geom).unwrap(), 2);
}

#[test]
fn image_counts_come_from_the_grid() {
    let mut graph = DataGraph::new();
    let grid = GridSpec::with_dimensions([4, 3, 2]);
    let geom = graph.create_geometry(EntityId::ROOT, "Image", Geometry::image(grid)).unwrap();
    assert_eq!(graph.number_of_cells(geom).unwrap(), 24);
    assert_eq!(grid.cell_tuple_shape(), vec![2, 3, 4]);
    assert!(matches!(graph.number_of_vertices(geom).unwrap_err().kind, ErrorKind::Unsupported(_)));
}

#[test]
fn rect_grid_counts_come_from_bounds() {
    let mut graph = DataGraph::new();
    let geom = graph
        .create_geometry(EntityId::ROOT, "Rect", Geometry::new(GeometryKind::RectGrid))
        .unwrap();
    for (name, role, len) in [
        ("x", GeometryRole::XBounds, 5),
        ("y", GeometryRole::YBounds, 3),
        ("z", GeometryRole::ZBounds, 2),
    ] {
        let id = graph
            .create_array(geom, name, DataStore::<f32>::new(vec![len], vec![1]))
            .unwrap();
        graph.geometry_mut(geom).unwrap().set_reference(role, Some(id));
    }
    assert_eq!(graph.number_of_cells(geom).unwrap(), 4 * 2);
}

#[test]
fn missing_connectivity_is_reported() {
    let mut graph = DataGraph::new();
    let geom = graph
        .create_geometry(EntityId::ROOT, "Edges", Geometry::new(GeometryKind::Edge))
        .unwrap();
    let err = graph.number_of_cells(geom).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::MissingReference { .. }));
}

// =============================================================================
// References
// =============================================================================

#[test]
fn removed_target_leaves_a_dangling_reference() {
    let (mut graph, geom) = triangle_pair();
    let tris = graph.resolve("Surface/SharedTriList").unwrap();
    graph.remove(tris).unwrap();
    let err = graph.geometry_reference(geom, GeometryRole::SharedFaces).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::DanglingReference { .. }));
    assert!(graph.validate_geometry(geom).is_err());
}

#[test]
fn shared_target_survives_geometry_removal() {
    let (mut graph, geom) = triangle_pair();
    let verts = graph.resolve("Surface/SharedVertexList").unwrap();
    let keep = graph.create_group(EntityId::ROOT, "Keep").unwrap();
    graph.add_parent(verts, keep).unwrap();
    graph.remove(geom).unwrap();
    assert!(graph.contains(verts));
    assert!(graph.resolve("Surface/SharedTriList").is_err());
}

#[test]
fn role_tags_are_distinct() {
    let tags: HashSet<&str> = GeometryRole::ALL.iter().map(|r| r.tag()).collect();
    assert_eq!(tags.len(), GeometryRole::ALL.len());
    assert_eq!(GeometryRole::SharedVertices.tag(), "SharedVertexListID");
}

#[test]
fn kind_names_round_trip() {
    for kind in GeometryKind::ALL {
        assert_eq!(GeometryKind::from_type_name(kind.type_name()), Some(kind));
    }
    assert_eq!(GeometryKind::Quad.unit_dimensionality(), 2);
    assert_eq!(GeometryKind::Hexahedral.vertices_per_cell(), 8);
}

// =============================================================================
// Derived Topology
// =============================================================================

#[test]
fn elements_containing_vertices() {
    let (mut graph, geom) = triangle_pair();
    let list = graph.find_elements_containing_vert(geom).unwrap();
    let rows = graph.list(list).unwrap().as_store::<u64>().unwrap().to_rows();
    assert_eq!(rows, vec![vec![0], vec![0, 1], vec![0, 1], vec![1]]);
    assert_eq!(graph.get(list).unwrap().name(), "Triangle Containing Vertices");
    assert_eq!(
        graph.geometry_reference(geom, GeometryRole::ElementsContainingVert).unwrap(),
        Some(list)
    );
}

#[test]
fn element_neighbors_share_an_edge() {
    let (mut graph, geom) = triangle_pair();
    let list = graph.find_element_neighbors(geom).unwrap();
    let rows = graph.list(list).unwrap().as_store::<u64>().unwrap().to_rows();
    assert_eq!(rows, vec![vec![1], vec![0]]);
}

#[test]
fn recomputing_replaces_the_old_list() {
    let (mut graph, geom) = triangle_pair();
    let first = graph.find_elements_containing_vert(geom).unwrap();
    let second = graph.find_elements_containing_vert(geom).unwrap();
    assert_ne!(first, second);
    assert!(!graph.contains(first));
    assert_eq!(graph.children(geom).unwrap().len(), 3);
}

#[test]
fn grids_have_no_derived_topology() {
    let mut graph = DataGraph::new();
    let geom = graph
        .create_geometry(EntityId::ROOT, "Image", Geometry::image(GridSpec::with_dimensions([2, 2, 2])))
        .unwrap();
    assert!(matches!(
        graph.find_element_neighbors(geom).unwrap_err().kind,
        ErrorKind::Unsupported(_)
    ));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn cell_table_must_match_cell_count() {
    let mut graph = DataGraph::new();
    let grid = GridSpec::with_dimensions([3, 2, 1]);
    let geom = graph.create_geometry(EntityId::ROOT, "Image", Geometry::image(grid)).unwrap();
    let cells = graph.create_attribute_table(geom, "Cell Data", grid.cell_tuple_shape()).unwrap();
    graph
        .geometry_mut(geom)
        .unwrap()
        .set_reference(GeometryRole::CellData, Some(cells));
    graph.validate_geometry(geom).unwrap();

    graph.resize_attribute_table(cells, vec![5]).unwrap();
    let err = graph.validate_geometry(geom).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ShapeMismatch { .. }));
}

#[test]
fn vertex_table_must_match_vertex_count() {
    let (mut graph, geom) = triangle_pair();
    let table = graph.create_attribute_table(geom, "Vertex Data", vec![3]).unwrap();
    graph
        .geometry_mut(geom)
        .unwrap()
        .set_reference(GeometryRole::VertexData, Some(table));
    assert!(graph.validate_geometry(geom).is_err());
}

#[test]
fn geometries_are_listed() {
    let (graph, geom) = triangle_pair();
    assert_eq!(graph.geometries(), vec![geom]);
}
