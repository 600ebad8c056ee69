//! Proximity probes against a target surface, with border classification.

use super::projection::distance_to_segment;
use crate::float_types::Real;
use crate::mesh::TriMesh;
use crate::traits::{ClosestHit, SpatialIndex};
use nalgebra::Point3;

/// What the target surface looks like from one query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probe {
    /// Closest point within the search radius, if any.
    pub hit: Option<ClosestHit>,
    /// Whether that closest point sits on the target's border.
    pub on_border: bool,
    /// Corner index of `hit.face` the closest point coincides with, if any.
    pub corner: Option<usize>,
}

impl Probe {
    pub const MISS: Probe = Probe {
        hit: None,
        on_border: false,
        corner: None,
    };

    /// Found a face and landed in its interior region (not on the border).
    #[inline]
    pub const fn is_good(&self) -> bool {
        self.hit.is_some() && !self.on_border
    }

    #[inline]
    pub fn face(&self) -> Option<usize> {
        self.hit.map(|h| h.face)
    }
}

/// A target surface seen through a spatial index.
///
/// `blocked` faces are treated as already gone: they are never returned by a probe
/// and the edges facing them count as border.
pub struct Surface<'a, I: SpatialIndex> {
    pub mesh: &'a TriMesh,
    pub index: &'a I,
    /// Search radius of every probe (the zippering tolerance).
    pub radius: Real,
    /// Distance under which a point counts as lying on an edge or a vertex.
    pub snap_eps: Real,
    pub blocked: &'a dyn Fn(usize) -> bool,
}

impl<'a, I: SpatialIndex> Surface<'a, I> {
    /// Closest point to `p` and its border classification.
    ///
    /// A closest point within `snap_eps` of a corner of its face is replaced by the
    /// exact corner position.
    pub fn probe(&self, p: &Point3<Real>) -> Probe {
        let Some(mut hit) = self
            .index
            .closest_where(p, self.radius, &|f| !(self.blocked)(f))
        else {
            return Probe::MISS;
        };

        let tri = self.mesh.triangle(hit.face);
        let corner = (0..3).find(|&k| (tri[k] - hit.point).norm() <= self.snap_eps);
        if let Some(k) = corner {
            hit.point = tri[k];
        }
        Probe {
            on_border: self.on_border(&hit, corner),
            hit: Some(hit),
            corner,
        }
    }

    /// Whether `hit.point` lies on a border edge of its face, or on a corner around
    /// which the surface is open.
    pub fn on_border(&self, hit: &ClosestHit, corner: Option<usize>) -> bool {
        let f = hit.face;
        let tri = self.mesh.triangle(f);

        for e in 0..3 {
            if self.is_open_edge(f, e) {
                let d = distance_to_segment(&tri[e], &tri[(e + 1) % 3], &hit.point);
                if d <= self.snap_eps {
                    return true;
                }
            }
        }

        corner.is_some_and(|k| self.mesh.is_border_vertex(f, k, self.blocked))
    }

    #[inline]
    fn is_open_edge(&self, f: usize, e: usize) -> bool {
        let n = self.mesh.faces[f].neighbors[e];
        n == f || (self.blocked)(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zipper::grid::FaceGrid;

    #[test]
    fn test_probe_classifies_border_and_interior() {
        let mesh = TriMesh::grid(Point3::origin(), 4, 4, 0.25, 0.25);
        let grid = FaceGrid::build(&mesh, 0..mesh.faces.len());
        let surface = Surface {
            mesh: &mesh,
            index: &grid,
            radius: 0.05,
            snap_eps: 1e-9,
            blocked: &|_| false,
        };

        let inside = surface.probe(&Point3::new(0.4, 0.6, 0.01));
        assert!(inside.is_good());

        let beyond_edge = surface.probe(&Point3::new(1.02, 0.6, 0.0));
        assert!(beyond_edge.hit.is_some() && beyond_edge.on_border);

        let on_vertex = surface.probe(&Point3::new(0.5, 0.5, 0.0));
        assert!(on_vertex.corner.is_some());
        assert!(on_vertex.is_good(), "interior vertex is not border");

        assert_eq!(surface.probe(&Point3::new(2.0, 2.0, 0.0)), Probe::MISS);
    }

    #[test]
    fn test_blocked_faces_open_the_surface() {
        let mesh = TriMesh::grid(Point3::origin(), 4, 4, 0.25, 0.25);
        let grid = FaceGrid::build(&mesh, 0..mesh.faces.len());
        let p = Point3::new(0.4, 0.6, 0.0);
        let victim = grid.closest(&p, 0.01).expect("on the grid").face;
        let blocked = move |f: usize| f == victim;
        let surface = Surface {
            mesh: &mesh,
            index: &grid,
            radius: 0.2,
            snap_eps: 1e-9,
            blocked: &blocked,
        };
        let probe = surface.probe(&p);
        assert_ne!(probe.face(), Some(victim));
        assert!(probe.on_border, "closest point now lies on the edge facing the hole");
    }
}
