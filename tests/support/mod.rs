//! Test support library
//! Provides various helper functions & utilities for tests.

#![allow(dead_code)]

use meshzip::{TriMesh, float_types::Real};
use nalgebra::{Point2, Point3};

/// Quick helper to compare floating-point results with an acceptable tolerance.
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

/// Signed area of every live face projected on the XY plane.
pub fn xy_area(mesh: &TriMesh) -> Real {
    mesh.live_faces()
        .map(|f| {
            let [a, b, c] = mesh.triangle(f);
            0.5 * ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x))
        })
        .sum()
}

/// Number of live faces whose XY projection strictly contains `p`.
pub fn coverage_at(mesh: &TriMesh, p: Point2<Real>) -> usize {
    let side = |a: &Point3<Real>, b: &Point3<Real>| (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    mesh.live_faces()
        .filter(|&f| {
            let [a, b, c] = mesh.triangle(f);
            let s = [side(&a, &b), side(&b, &c), side(&c, &a)];
            s.iter().all(|&x| x > 0.0) || s.iter().all(|&x| x < 0.0)
        })
        .count()
}

/// Index of a live vertex at `p` (within `eps`).
pub fn find_vertex(mesh: &TriMesh, p: Point3<Real>, eps: Real) -> Option<usize> {
    mesh.vertices
        .iter()
        .position(|v| !v.deleted && (v.pos - p).norm() < eps)
}

/// Every live face normal points along +Z.
pub fn all_faces_up(mesh: &TriMesh) -> bool {
    mesh.live_faces().all(|f| mesh.face_normal(f).z > 0.0)
}

/// `n` x `n` grid of `pitch`-sized cells at the origin, without the faces whose
/// barycenter lies strictly inside the square `(lo, hi)^2`.
pub fn holed_grid(n: usize, pitch: Real, lo: Real, hi: Real) -> TriMesh {
    let mut mesh = TriMesh::grid(Point3::origin(), n, n, pitch, pitch);
    let inside = |c: Real| c > lo && c < hi;
    for f in 0..mesh.faces.len() {
        let c = mesh.barycenter(f);
        if inside(c.x) && inside(c.y) {
            mesh.delete_face(f);
        }
    }
    mesh.remove_unreferenced_vertices();
    mesh.compact();
    mesh
}

/// Copy of `mesh` turned by `angle` radians about the Z axis through `center`.
pub fn rotated(mesh: &TriMesh, angle: Real, center: Point2<Real>) -> TriMesh {
    let (sin, cos) = angle.sin_cos();
    let mut out = mesh.clone();
    for v in &mut out.vertices {
        let (dx, dy) = (v.pos.x - center.x, v.pos.y - center.y);
        v.pos = Point3::new(center.x + dx * cos - dy * sin, center.y + dx * sin + dy * cos, v.pos.z);
    }
    out.invalidate_bounding_box();
    out
}
