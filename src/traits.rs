use crate::float_types::Real;
use nalgebra::{Point2, Point3};

/// Result of a closest-point query against a face set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestHit {
    /// Index of the face carrying the closest point.
    pub face: usize,
    /// The closest point on that face.
    pub point: Point3<Real>,
    /// Euclidean distance from the query point.
    pub distance: Real,
}

/// Static proximity index over a snapshot of mesh faces.
///
/// Faces appended to the mesh after the index was built are invisible to it.
pub trait SpatialIndex {
    /// Closest point on any indexed face within `max_dist`, or `None`.
    fn closest(&self, point: &Point3<Real>, max_dist: Real) -> Option<ClosestHit> {
        self.closest_where(point, max_dist, &|_| true)
    }

    /// Like [`SpatialIndex::closest`], skipping every face for which `accept` is false.
    fn closest_where(
        &self,
        point: &Point3<Real>,
        max_dist: Real,
        accept: &dyn Fn(usize) -> bool,
    ) -> Option<ClosestHit>;
}

/// Triangulation of a simple planar polygon outline.
pub trait PolygonTriangulator {
    /// Index triples into `outline`; empty when the outline cannot be triangulated.
    fn triangulate(&self, outline: &[Point2<Real>]) -> Vec<[usize; 3]>;
}
