mod support;

use meshzip::float_types::Real;
use meshzip::{MeshRole, TriMesh, Zipper, ZipperError, ZipperParams, zipper};
use nalgebra::{Point2, Point3};
use support::{all_faces_up, approx_eq, coverage_at, find_vertex, xy_area};

fn unit_grid(origin: Point3<Real>) -> TriMesh {
    TriMesh::grid(origin, 2, 2, 0.5, 0.5)
}

#[test]
fn abutting_squares_share_one_seam() {
    let base = unit_grid(Point3::origin());
    let patch = unit_grid(Point3::new(1.01, 0.0, 0.0));

    let out = Zipper::new(ZipperParams::new(0.05))
        .zip(&base, &patch)
        .expect("valid inputs");
    let mesh = &out.mesh;

    assert_eq!(out.report.redundant_total(), 0);
    assert_eq!(out.report.loop_guard_aborts, 0);
    assert_eq!(out.report.vertices_inserted, 0);
    assert_eq!(mesh.vertex_count(), 15);
    assert_eq!(mesh.face_count(), 16);
    assert_eq!(mesh.border_edge_total(), 12);

    // the patch moved onto the base border, nothing is left at x = 1.01
    assert!(mesh.vertices.iter().all(|v| !approx_eq(v.pos.x, 1.01, 1e-9)));
    for y in [0.0, 0.5, 1.0] {
        assert!(find_vertex(mesh, Point3::new(1.0, y, 0.0), 1e-12).is_some());
    }

    let analysis = mesh.analyze_manifold();
    assert!(analysis.is_manifold);
    assert!(analysis.consistent_orientation);
    assert_eq!(analysis.connected_components, 1);
    assert_eq!(analysis.euler_characteristic, 1);
}

#[test]
fn touching_squares_merge_coincident_vertices() {
    let base = unit_grid(Point3::origin());
    let patch = unit_grid(Point3::new(1.0, 0.0, 0.0));

    let mesh = zipper(&base, &patch, 0.05).expect("valid inputs");
    assert_eq!(mesh.vertex_count(), 15);
    assert_eq!(mesh.face_count(), 16);
    assert_eq!(mesh.border_edge_total(), 12);
    assert_eq!(mesh.analyze_manifold().connected_components, 1);
}

#[test]
fn patch_inside_base_disappears() {
    let base = TriMesh::grid(Point3::origin(), 6, 6, 1.0, 1.0);
    let patch = TriMesh::grid(Point3::new(2.0, 2.0, 0.0), 2, 2, 1.0, 1.0);

    let params = ZipperParams::new(0.1).with_samples_per_edge(10);
    let out = Zipper::new(params).zip(&base, &patch).expect("valid inputs");

    assert_eq!(out.report.redundant_patch, 8);
    assert_eq!(out.report.redundant_base, 0);
    assert_eq!(out.report.border_edges_walked, 0);
    assert_eq!(out.mesh.vertex_count(), base.vertex_count());
    assert_eq!(out.mesh.to_indexed(), base.to_indexed());
}

#[test]
fn distant_patch_is_kept_separate() {
    let base = unit_grid(Point3::origin());
    let patch = unit_grid(Point3::new(3.0, 0.0, 0.0));

    let out = Zipper::new(ZipperParams::new(0.05))
        .zip(&base, &patch)
        .expect("valid inputs");
    assert_eq!(out.report.border_edges_walked, 8);
    assert_eq!(out.report.faces_retriangulated, 0);
    assert_eq!(out.mesh.vertex_count(), 18);
    assert_eq!(out.mesh.face_count(), 16);
    assert_eq!(out.mesh.analyze_manifold().connected_components, 2);
}

mod overlap {
    use super::*;

    fn params() -> ZipperParams {
        ZipperParams::new(0.02).with_samples_per_edge(50)
    }

    /// Base `[0, 1]^2` and patch `[0.8, 1.8] x [-0.1, 0.9]`, both 4x4 grids.
    fn zipped_with(params: ZipperParams) -> meshzip::ZipperOutput {
        let base = TriMesh::grid(Point3::origin(), 4, 4, 0.25, 0.25);
        let patch = TriMesh::grid(Point3::new(0.8, -0.1, 0.0), 4, 4, 0.25, 0.25);
        Zipper::new(params).zip(&base, &patch).expect("valid inputs")
    }

    fn zipped() -> meshzip::ZipperOutput {
        zipped_with(params())
    }

    /// Whether `p` lies on the outline of the union of both squares.
    fn on_union_outline(p: &Point3<Real>) -> bool {
        let outline = [
            Point2::new(0.0, 0.0),
            Point2::new(0.8, 0.0),
            Point2::new(0.8, -0.1),
            Point2::new(1.8, -0.1),
            Point2::new(1.8, 0.9),
            Point2::new(1.0, 0.9),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let q = Point2::new(p.x, p.y);
        (0..outline.len()).any(|i| {
            let (a, b) = (outline[i], outline[(i + 1) % outline.len()]);
            let ab = b - a;
            let t = ((q - a).dot(&ab) / ab.norm_squared()).clamp(0.0, 1.0);
            (a + ab * t - q).norm() < 1e-6
        })
    }

    #[test]
    fn overlap_is_cut_without_aborts() {
        let out = zipped();
        assert_eq!(out.report.redundant_total(), 0);
        assert_eq!(out.report.loop_guard_aborts, 0);
        assert!(out.report.faces_retriangulated > 0);
        assert!(out.report.vertices_inserted > 0);
        assert!(all_faces_up(&out.mesh));
    }

    #[test]
    fn result_covers_the_union_once() {
        let mesh = zipped().mesh;
        assert!(approx_eq(xy_area(&mesh), 1.82, 1e-4));

        for (x, y) in [
            (0.41, 0.553),
            (0.781, 0.437),
            (1.517, 0.493),
            (0.873, 0.531),
            (0.913, 0.957),
            (0.911, -0.063),
        ] {
            assert_eq!(coverage_at(&mesh, Point2::new(x, y)), 1, "coverage at ({x}, {y})");
        }
        assert_eq!(coverage_at(&mesh, Point2::new(1.5, 0.97)), 0);
    }

    #[test]
    fn border_follows_union_outline() {
        let mesh = zipped().mesh;
        for f in mesh.live_faces() {
            for e in 0..3 {
                if !mesh.is_border_edge(f, e) {
                    continue;
                }
                let (a, b) = mesh.faces[f].edge(e);
                let mid = nalgebra::center(&mesh.position(a), &mesh.position(b));
                assert!(on_union_outline(&mid), "open edge inside the union at {mid}");
            }
        }
        assert_eq!(mesh.analyze_manifold().connected_components, 1);
    }

    #[test]
    fn single_step_walks_abort_without_damage() {
        // the left patch edge needs a midpoint split, which a budget of two sub-edges cannot finish
        let out = zipped_with(params().with_max_walk_steps(1));
        assert!(out.report.loop_guard_aborts > 0);
        assert!(out.report.border_edges_walked > out.report.loop_guard_aborts);
        assert!(out.mesh.adjacency_is_symmetric());
        assert_eq!(coverage_at(&out.mesh, Point2::new(0.2, 0.55)), 1);
        assert_eq!(coverage_at(&out.mesh, Point2::new(1.5, 0.5)), 1);
    }
}

mod holed_base {
    use super::*;
    use support::{holed_grid, rotated};

    fn params() -> ZipperParams {
        ZipperParams::new(0.05).with_samples_per_edge(50)
    }

    /// Unit grid over `[0, 10]^2` with the `[4, 6]^2` cells missing.
    fn base() -> TriMesh {
        holed_grid(10, 1.0, 4.0, 6.0)
    }

    /// 7x7 unit patch over `[1.5, 8.5]^2`.
    fn patch() -> TriMesh {
        TriMesh::grid(Point3::new(1.5, 1.5, 0.0), 7, 7, 1.0, 1.0)
    }

    fn on_outer_square(p: &Point3<Real>) -> bool {
        let on = |c: Real| approx_eq(c, 0.0, 1e-6) || approx_eq(c, 10.0, 1e-6);
        let within = |c: Real| c > -1e-6 && c < 10.0 + 1e-6;
        (on(p.x) && within(p.y)) || (on(p.y) && within(p.x))
    }

    /// The result is the plain `[0, 10]^2` square: covered once, open only at its outline.
    fn assert_hole_closed(out: &meshzip::ZipperOutput) {
        let mesh = &out.mesh;
        assert_eq!(out.report.loop_guard_aborts, 0);
        assert!(approx_eq(xy_area(mesh), 100.0, 1e-6), "area {}", xy_area(mesh));
        assert!(mesh.adjacency_is_symmetric());

        for f in mesh.live_faces() {
            for e in 0..3 {
                if !mesh.is_border_edge(f, e) {
                    continue;
                }
                let (a, b) = mesh.faces[f].edge(e);
                let mid = nalgebra::center(&mesh.position(a), &mesh.position(b));
                assert!(on_outer_square(&mid), "open edge inside the square at {mid}");
            }
        }
        for i in 0..20 {
            for j in 0..20 {
                let p = Point2::new(0.5 * i as Real + 0.0137, 0.5 * j as Real + 0.0291);
                assert_eq!(coverage_at(mesh, p), 1, "coverage at {p}");
            }
        }
    }

    #[test]
    fn aligned_patch_closes_the_hole() {
        let out = Zipper::new(params()).zip(&base(), &patch()).expect("valid inputs");
        assert_eq!(out.report.redundant_base, 0);
        assert_hole_closed(&out);
    }

    #[test]
    fn rotated_patch_closes_the_hole() {
        let patch = rotated(&patch(), 0.3, Point2::new(5.0, 5.0));
        let out = Zipper::new(params()).zip(&base(), &patch).expect("valid inputs");
        assert_eq!(out.report.redundant_base, 0);
        assert!(out.report.faces_retriangulated > 0);
        assert_hole_closed(&out);
    }

    #[test]
    fn patch_reaching_past_several_base_cells_closes_the_hole() {
        // half-unit base cells, so every patch cell spans several base cells
        let base = holed_grid(20, 0.5, 4.0, 6.0);
        let patch = TriMesh::grid(Point3::new(1.2, 1.35, 0.0), 7, 7, 1.0, 1.0);
        let out = Zipper::new(params()).zip(&base, &patch).expect("valid inputs");
        assert!(out.report.faces_enclosed > 0);
        assert_hole_closed(&out);
    }
}

#[test]
fn invalid_tolerance_is_rejected() {
    let base = unit_grid(Point3::origin());
    let patch = unit_grid(Point3::new(1.0, 0.0, 0.0));
    for tolerance in [0.0, -1.0, Real::NAN, Real::INFINITY] {
        assert!(matches!(
            zipper(&base, &patch, tolerance),
            Err(ZipperError::InvalidTolerance(_))
        ));
    }
}

#[test]
fn empty_base_is_rejected() {
    let patch = unit_grid(Point3::origin());
    assert_eq!(
        zipper(&TriMesh::new(), &patch, 0.1).err(),
        Some(ZipperError::EmptyMesh(MeshRole::Base))
    );
}

#[test]
fn inputs_are_left_untouched() {
    let base = unit_grid(Point3::origin());
    let patch = unit_grid(Point3::new(0.75, 0.25, 0.0));
    let (before_base, before_patch) = (base.to_indexed(), patch.to_indexed());

    let _ = zipper(&base, &patch, 0.05).expect("valid inputs");
    assert_eq!(base.to_indexed(), before_base);
    assert_eq!(patch.to_indexed(), before_patch);
}
