mod support;

use meshzip::float_types::Real;
use meshzip::{TriMesh, ZipperError};
use nalgebra::{Point3, Vector3};
use support::{all_faces_up, find_vertex};

#[test]
fn indexed_round_trip_keeps_geometry() {
    let mesh = TriMesh::grid(Point3::origin(), 3, 2, 1.0, 1.0);
    let (positions, triangles) = mesh.to_indexed();
    let rebuilt = TriMesh::from_indexed(positions.clone(), triangles.clone()).expect("valid mesh");
    assert_eq!(rebuilt.to_indexed(), (positions, triangles));
    assert_eq!(rebuilt.border_edge_total(), mesh.border_edge_total());
    assert!(rebuilt.adjacency_is_symmetric());
}

#[test]
fn errors_name_their_variant() {
    let err = TriMesh::from_indexed(vec![Point3::origin()], vec![[0, 1, 2]]).unwrap_err();
    assert!(matches!(err, ZipperError::VertexIndexOutOfRange { face: 0, .. }));
    assert!(err.to_string().starts_with("(VertexIndexOutOfRange)"));

    let err = TriMesh::from_indexed(vec![Point3::new(Real::NAN, 0.0, 0.0)], vec![]).unwrap_err();
    assert!(err.to_string().starts_with("(InvalidCoordinate)"));
}

#[test]
fn flipped_grid_faces_down_and_stays_manifold() {
    let mesh = TriMesh::grid(Point3::origin(), 2, 2, 1.0, 1.0);
    assert!(all_faces_up(&mesh));
    let flipped = mesh.flipped();
    assert!(flipped.live_faces().all(|f| flipped.face_normal(f).z < 0.0));
    let analysis = flipped.analyze_manifold();
    assert!(analysis.is_manifold);
    assert_eq!(analysis.boundary_edges, 8);
}

#[test]
fn append_then_clean_welds_shared_positions() {
    let left = TriMesh::grid(Point3::origin(), 1, 1, 1.0, 1.0);
    let right = left.translated(Vector3::new(1.0, 0.0, 0.0));

    let mut mesh = left.clone();
    let offset = mesh.append(&right);
    assert_eq!(offset, 2);
    assert_eq!(mesh.border_edge_total(), 8);

    let stats = mesh.clean();
    assert_eq!(stats.merged_vertices, 2);
    assert_eq!(mesh.vertex_count(), 6);
    assert_eq!(mesh.border_edge_total(), 6);
    assert!(find_vertex(&mesh, Point3::new(1.0, 1.0, 0.0), 1e-12).is_some());
    assert_eq!(mesh.analyze_manifold().connected_components, 1);
}
