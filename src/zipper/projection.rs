//! Tangent-plane projection and small closest-point helpers shared by the phases.

use crate::float_types::Real;
use crate::float_types::parry3d::query::PointQuery;
use crate::float_types::parry3d::shape::{Segment, Triangle};
use nalgebra::{Point2, Point3, Vector3};

/// Build orthonormal basis for 2D projection.
///
/// Returns `(u, v)` with `u × v = n`, so a polygon that winds counter-clockwise
/// around `n` stays counter-clockwise after projection.
pub fn build_orthonormal_basis(n: Vector3<Real>) -> (Vector3<Real>, Vector3<Real>) {
    let n = n.normalize();

    let other = if n.x.abs() < n.y.abs() && n.x.abs() < n.z.abs() {
        Vector3::x()
    } else if n.y.abs() < n.z.abs() {
        Vector3::y()
    } else {
        Vector3::z()
    };

    let v = n.cross(&other).normalize();
    let u = v.cross(&n).normalize();

    (u, v)
}

/// The plane of a face, seen from above its normal.
#[derive(Debug, Clone, Copy)]
pub struct TangentFrame {
    pub origin: Point3<Real>,
    pub normal: Vector3<Real>,
    u: Vector3<Real>,
    v: Vector3<Real>,
}

impl TangentFrame {
    pub fn new(origin: Point3<Real>, normal: Vector3<Real>) -> Self {
        let (u, v) = build_orthonormal_basis(normal);
        TangentFrame {
            origin,
            normal: normal.normalize(),
            u,
            v,
        }
    }

    /// Frame of a triangle, anchored at its first corner.
    pub fn of_triangle(tri: &[Point3<Real>; 3]) -> Option<Self> {
        let n = (tri[1] - tri[0]).cross(&(tri[2] - tri[0]));
        n.try_normalize(Real::EPSILON)
            .map(|n| TangentFrame::new(tri[0], n))
    }

    #[inline]
    pub fn project(&self, p: &Point3<Real>) -> Point2<Real> {
        let d = p - self.origin;
        Point2::new(d.dot(&self.u), d.dot(&self.v))
    }
}

/// Closest point to `p` on the triangle `tri`.
#[inline]
pub fn closest_on_triangle(tri: &[Point3<Real>; 3], p: &Point3<Real>) -> Point3<Real> {
    Triangle::new(tri[0], tri[1], tri[2])
        .project_local_point(p, false)
        .point
}

/// Closest point to `p` on the segment `a`-`b`.
#[inline]
pub fn closest_on_segment(a: &Point3<Real>, b: &Point3<Real>, p: &Point3<Real>) -> Point3<Real> {
    if a == b {
        return *a;
    }
    Segment::new(*a, *b).project_local_point(p, false).point
}

#[inline]
pub fn distance_to_segment(a: &Point3<Real>, b: &Point3<Real>, p: &Point3<Real>) -> Real {
    (closest_on_segment(a, b, p) - p).norm()
}

/// `count + 1` evenly spaced points from `a` to `b`, both endpoints included.
pub fn sample_segment(
    a: Point3<Real>,
    b: Point3<Real>,
    count: usize,
) -> impl Iterator<Item = Point3<Real>> {
    let count = count.max(1);
    (0..=count).map(move |k| a + (b - a) * (k as Real / count as Real))
}

/// Twice the signed area of the 2D triangle `a b c` (positive when counter-clockwise).
#[inline]
pub fn orient2d(a: &Point2<Real>, b: &Point2<Real>, c: &Point2<Real>) -> Real {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Intersection of the 2D segments `p0 p1` and `q0 q1`, endpoints included.
///
/// Returns the parameters `(s, t)` of the crossing along each segment. Parallel
/// segments never intersect here, even when they overlap.
pub fn segment_intersection_2d(
    p0: &Point2<Real>,
    p1: &Point2<Real>,
    q0: &Point2<Real>,
    q1: &Point2<Real>,
) -> Option<(Real, Real)> {
    let r = p1 - p0;
    let s = q1 - q0;
    let denom = r.x * s.y - r.y * s.x;
    let scale = r.norm() * s.norm();
    if denom.abs() <= Real::EPSILON * scale || scale == 0.0 {
        return None;
    }
    let qp = q0 - p0;
    let t = (qp.x * s.y - qp.y * s.x) / denom;
    let u = (qp.x * r.y - qp.y * r.x) / denom;
    let slack = 1e3 * Real::EPSILON;
    if (-slack..=1.0 + slack).contains(&t) && (-slack..=1.0 + slack).contains(&u) {
        Some((t.clamp(0.0, 1.0), u.clamp(0.0, 1.0)))
    } else {
        None
    }
}

/// Signed area of a closed 2D ring (positive when counter-clockwise).
pub fn ring_area(ring: &[Point2<Real>]) -> Real {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (a, b) = (ring[i], ring[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<Real>()
        * 0.5
}
