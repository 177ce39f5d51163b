//! Integration tests for the XDMF side-car

use std::fs;

use datagraph_foundation::EntityId;
use datagraph_io::{WriteOptions, write_file_with, write_xdmf};
use datagraph_storage::{DataGraph, DataStore, Geometry, GeometryKind, GeometryRole, GridSpec};

fn mesh_graph() -> DataGraph {
    let mut graph = DataGraph::new();
    let mesh = graph
        .create_geometry(EntityId::ROOT, "Mesh", Geometry::new(GeometryKind::Quad))
        .unwrap();
    let verts = graph
        .create_array(mesh, "Vertices", DataStore::<f32>::new(vec![6], vec![3]))
        .unwrap();
    let quads = DataStore::from_vec(vec![2], vec![4], vec![0u64, 1, 4, 3, 1, 2, 5, 4]).unwrap();
    let quads = graph.create_array(mesh, "Quads", quads).unwrap();
    let faces = graph.create_attribute_table(mesh, "Face Data", vec![2]).unwrap();
    graph
        .create_array(faces, "Area", DataStore::<f64>::new(vec![2], vec![1]))
        .unwrap();
    let geometry = graph.geometry_mut(mesh).unwrap();
    geometry.set_reference(GeometryRole::SharedVertices, Some(verts));
    geometry.set_reference(GeometryRole::SharedFaces, Some(quads));
    geometry.set_reference(GeometryRole::FaceData, Some(faces));

    graph
        .create_geometry(
            EntityId::ROOT,
            "Grid",
            Geometry::image(GridSpec::with_dimensions([2, 2, 2])),
        )
        .unwrap();
    graph
}

#[test]
fn side_car_sits_next_to_the_container() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.dgraph");
    write_file_with(&mesh_graph(), &path, &WriteOptions::with_xdmf()).unwrap();

    let text = fs::read_to_string(dir.path().join("scan.xdmf")).unwrap();
    assert!(text.contains("<Grid Name=\"Mesh\""));
    assert!(text.contains("<Grid Name=\"Grid\""));
    assert!(text.contains("<Topology TopologyType=\"Quadrilateral\" NumberOfElements=\"2\">"));
    assert!(text.contains("scan.dgraph:/DataStructure/Mesh/Quads"));
    assert!(text.contains("scan.dgraph:/DataStructure/Mesh/Face Data/Area"));
    assert!(text.contains("NumberType=\"Float\" Precision=\"8\""));
}

#[test]
fn no_side_car_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.dgraph");
    write_file_with(&mesh_graph(), &path, &WriteOptions::default()).unwrap();
    assert!(!dir.path().join("plain.xdmf").exists());
}

#[test]
fn geometry_without_vertices_is_left_out() {
    let dir = tempfile::tempdir().unwrap();
    let mut graph = mesh_graph();
    let mesh = graph.resolve("Mesh").unwrap();
    graph
        .geometry_mut(mesh)
        .unwrap()
        .set_reference(GeometryRole::SharedVertices, None);

    let path = dir.path().join("partial.xdmf");
    write_xdmf(&path, &graph, "partial.dgraph").unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(!text.contains("<Grid Name=\"Mesh\""));
    assert!(!text.contains("END OF Mesh"));
    assert!(text.contains("<Grid Name=\"Grid\""));
    assert!(text.trim_end().ends_with("</Xdmf>"));
}
