//! Uniform face grid answering closest-point queries within a radius.

use super::projection::closest_on_triangle;
use crate::float_types::Real;
use crate::mesh::TriMesh;
use crate::traits::{ClosestHit, SpatialIndex};
use hashbrown::{HashMap, HashSet};
use nalgebra::{Point3, Vector3};

type CellCoord = [i64; 3];

/// Static grid over a snapshot of mesh faces.
///
/// Each face is registered in every cell its bounding box overlaps. The cell size is
/// the mean face extent, so a query with a radius in the order of one face touches a
/// handful of cells. Triangles are copied at build time, so later edits of the mesh
/// are not seen by the grid.
#[derive(Debug, Clone)]
pub struct FaceGrid {
    cell_size: Real,
    origin: Point3<Real>,
    cells: HashMap<CellCoord, Vec<usize>>,
    min_cell: CellCoord,
    max_cell: CellCoord,
    /// (mesh face index, corners) per indexed face
    triangles: Vec<(usize, [Point3<Real>; 3])>,
}

impl FaceGrid {
    /// Index the live faces of `mesh` whose index lies in `faces`.
    pub fn build(mesh: &TriMesh, faces: std::ops::Range<usize>) -> Self {
        let triangles: Vec<(usize, [Point3<Real>; 3])> = faces
            .filter(|&f| f < mesh.faces.len() && !mesh.faces[f].deleted)
            .map(|f| (f, mesh.triangle(f)))
            .collect();

        let mut mins = Point3::new(Real::MAX, Real::MAX, Real::MAX);
        let mut maxs = Point3::new(-Real::MAX, -Real::MAX, -Real::MAX);
        let mut extent_sum = 0.0;
        for (_, tri) in &triangles {
            let (lo, hi) = tri_bounds(tri);
            mins = mins.inf(&lo);
            maxs = maxs.sup(&hi);
            extent_sum += (hi - lo).max();
        }

        if triangles.is_empty() {
            return FaceGrid {
                cell_size: 1.0,
                origin: Point3::origin(),
                cells: HashMap::new(),
                min_cell: [0; 3],
                max_cell: [0; 3],
                triangles,
            };
        }

        let diagonal = (maxs - mins).norm();
        let cell_size = (extent_sum / triangles.len() as Real)
            .max(diagonal * 1e-6)
            .max(Real::EPSILON);

        let mut grid = FaceGrid {
            cell_size,
            origin: mins,
            cells: HashMap::new(),
            min_cell: [i64::MAX; 3],
            max_cell: [i64::MIN; 3],
            triangles: Vec::new(),
        };

        for (slot, (_, tri)) in triangles.iter().enumerate() {
            let (lo, hi) = tri_bounds(tri);
            let (c0, c1) = (grid.cell_of(&lo), grid.cell_of(&hi));
            for x in c0[0]..=c1[0] {
                for y in c0[1]..=c1[1] {
                    for z in c0[2]..=c1[2] {
                        grid.cells.entry([x, y, z]).or_default().push(slot);
                    }
                }
            }
            for k in 0..3 {
                grid.min_cell[k] = grid.min_cell[k].min(c0[k]);
                grid.max_cell[k] = grid.max_cell[k].max(c1[k]);
            }
        }
        grid.triangles = triangles;
        grid
    }

    /// Number of indexed faces.
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    fn cell_of(&self, p: &Point3<Real>) -> CellCoord {
        let rel: Vector3<Real> = (p - self.origin) / self.cell_size;
        [rel.x, rel.y, rel.z].map(|c| c.floor() as i64)
    }

    fn nearest(
        &self,
        point: &Point3<Real>,
        max_dist: Real,
        accept: &dyn Fn(usize) -> bool,
        candidates: impl Iterator<Item = usize>,
    ) -> Option<ClosestHit> {
        let mut best: Option<ClosestHit> = None;
        for slot in candidates {
            let (face, tri) = &self.triangles[slot];
            if !accept(*face) {
                continue;
            }
            let q = closest_on_triangle(tri, point);
            let d = (q - point).norm();
            let better = match &best {
                Some(b) => d < b.distance,
                None => d <= max_dist,
            };
            if better {
                best = Some(ClosestHit {
                    face: *face,
                    point: q,
                    distance: d,
                });
            }
        }
        best
    }
}

impl SpatialIndex for FaceGrid {
    fn closest_where(
        &self,
        point: &Point3<Real>,
        max_dist: Real,
        accept: &dyn Fn(usize) -> bool,
    ) -> Option<ClosestHit> {
        if self.triangles.is_empty() || !(max_dist >= 0.0) {
            return None;
        }
        let r = Vector3::repeat(max_dist);
        let lo = self.cell_of(&(point - r));
        let hi = self.cell_of(&(point + r));
        let lo: CellCoord = std::array::from_fn(|k| lo[k].max(self.min_cell[k]));
        let hi: CellCoord = std::array::from_fn(|k| hi[k].min(self.max_cell[k]));
        if (0..3).any(|k| lo[k] > hi[k]) {
            return None;
        }

        let span = (0..3).map(|k| (hi[k] - lo[k] + 1) as u128).product::<u128>();
        if span > self.triangles.len() as u128 {
            // a radius much larger than the cells: scanning every face is cheaper
            return self.nearest(point, max_dist, accept, 0..self.triangles.len());
        }

        let mut seen: HashSet<usize> = HashSet::new();
        let mut slots = Vec::new();
        for x in lo[0]..=hi[0] {
            for y in lo[1]..=hi[1] {
                for z in lo[2]..=hi[2] {
                    if let Some(list) = self.cells.get(&[x, y, z]) {
                        slots.extend(list.iter().copied().filter(|s| seen.insert(*s)));
                    }
                }
            }
        }
        self.nearest(point, max_dist, accept, slots.into_iter())
    }
}

fn tri_bounds(tri: &[Point3<Real>; 3]) -> (Point3<Real>, Point3<Real>) {
    (tri[0].inf(&tri[1]).inf(&tri[2]), tri[0].sup(&tri[1]).sup(&tri[2]))
}
