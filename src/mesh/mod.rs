//! `TriMesh`: an indexed triangle mesh with face-face adjacency, stored as arenas
//! with tombstones so that whole phases can delete and append before compacting.

use crate::errors::{ZipperError, ZipperResult};
use crate::float_types::Real;
use crate::float_types::parry3d::bounding_volume::Aabb;
use nalgebra::{Point3, Vector3};
use std::sync::OnceLock;

pub mod clean;
pub mod manifold;
pub mod shapes;
pub mod topology;

pub use topology::BorderPos;

/// A mesh vertex. The position is owned by the mesh; faces refer to it by index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub pos: Point3<Real>,
    /// Tombstone set by merges; cleared away by [`TriMesh::compact`].
    pub deleted: bool,
}

impl Vertex {
    pub const fn new(pos: Point3<Real>) -> Self {
        Vertex {
            pos,
            deleted: false,
        }
    }
}

/// A triangle with its face-face adjacency.
///
/// Edge `i` runs from `vertices[i]` to `vertices[(i + 1) % 3]`. `neighbors[i]` is the
/// face across edge `i` and `neighbor_edges[i]` the index of the same edge inside that
/// face. A face that names itself as neighbor marks edge `i` as a border edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    pub vertices: [usize; 3],
    pub neighbors: [usize; 3],
    pub neighbor_edges: [usize; 3],
    pub deleted: bool,
}

impl Face {
    /// A detached face: every edge is a border edge until adjacency is rebuilt.
    pub const fn detached(index: usize, vertices: [usize; 3]) -> Self {
        Face {
            vertices,
            neighbors: [index; 3],
            neighbor_edges: [0, 1, 2],
            deleted: false,
        }
    }

    /// Corner position of a vertex index inside this face.
    pub fn corner_of(&self, vertex: usize) -> Option<usize> {
        self.vertices.iter().position(|&v| v == vertex)
    }

    /// Vertex indices of edge `e` in face order.
    #[inline]
    pub const fn edge(&self, e: usize) -> (usize, usize) {
        (self.vertices[e], self.vertices[(e + 1) % 3])
    }
}

/// Indexed triangle mesh.
#[derive(Debug, Clone, Default)]
pub struct TriMesh {
    pub vertices: Vec<Vertex>,
    pub faces: Vec<Face>,
    /// Lazily calculated AABB over live vertices.
    pub bounding_box: OnceLock<Aabb>,
}

impl TriMesh {
    pub fn new() -> Self {
        TriMesh::default()
    }

    /// Build a mesh from plain position and triangle arrays.
    ///
    /// Every index must be in range, a face must not repeat a vertex and every
    /// coordinate must be finite. Face-face adjacency is built before returning.
    pub fn from_indexed(
        positions: Vec<Point3<Real>>,
        triangles: Vec<[usize; 3]>,
    ) -> ZipperResult<TriMesh> {
        for (index, point) in positions.iter().enumerate() {
            if !point.coords.iter().all(|c| c.is_finite()) {
                return Err(ZipperError::InvalidCoordinate {
                    index,
                    point: *point,
                });
            }
        }

        let count = positions.len();
        for (face, tri) in triangles.iter().enumerate() {
            for (k, &index) in tri.iter().enumerate() {
                if index >= count {
                    return Err(ZipperError::VertexIndexOutOfRange { face, index, count });
                }
                if tri[(k + 1) % 3] == index {
                    return Err(ZipperError::RepeatedFaceIndex { face, index });
                }
            }
        }

        let mut mesh = TriMesh {
            vertices: positions.into_iter().map(Vertex::new).collect(),
            faces: triangles
                .into_iter()
                .enumerate()
                .map(|(i, tri)| Face::detached(i, tri))
                .collect(),
            bounding_box: OnceLock::new(),
        };
        mesh.rebuild_adjacency();
        Ok(mesh)
    }

    /// Export live geometry as plain arrays (vertex order preserved, deleted entries skipped).
    pub fn to_indexed(&self) -> (Vec<Point3<Real>>, Vec<[usize; 3]>) {
        let mut remap = vec![usize::MAX; self.vertices.len()];
        let mut positions = Vec::new();
        for (i, v) in self.vertices.iter().enumerate() {
            if !v.deleted {
                remap[i] = positions.len();
                positions.push(v.pos);
            }
        }
        let triangles = self
            .faces
            .iter()
            .filter(|f| !f.deleted)
            .map(|f| f.vertices.map(|v| remap[v]))
            .collect();
        (positions, triangles)
    }

    /// Append a vertex, returning its index.
    pub fn add_vertex(&mut self, pos: Point3<Real>) -> usize {
        self.vertices.push(Vertex::new(pos));
        self.invalidate_bounding_box();
        self.vertices.len() - 1
    }

    /// Append a detached face, returning its index. Adjacency is stale until
    /// [`TriMesh::rebuild_adjacency`] runs.
    pub fn add_face(&mut self, vertices: [usize; 3]) -> usize {
        let index = self.faces.len();
        self.faces.push(Face::detached(index, vertices));
        index
    }

    /// Tombstone a face and turn the edges its neighbors shared with it into border edges.
    pub fn delete_face(&mut self, f: usize) {
        if self.faces[f].deleted {
            return;
        }
        for e in 0..3 {
            let n = self.faces[f].neighbors[e];
            if n != f {
                let ne = self.faces[f].neighbor_edges[e];
                self.faces[n].neighbors[ne] = n;
                self.faces[n].neighbor_edges[ne] = ne;
            }
        }
        self.faces[f].deleted = true;
        self.faces[f].neighbors = [f; 3];
        self.faces[f].neighbor_edges = [0, 1, 2];
    }

    /// Indices of faces that are not tombstoned.
    pub fn live_faces(&self) -> impl Iterator<Item = usize> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.deleted)
            .map(|(i, _)| i)
    }

    pub fn face_count(&self) -> usize {
        self.faces.iter().filter(|f| !f.deleted).count()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.iter().filter(|v| !v.deleted).count()
    }

    #[inline]
    pub fn position(&self, v: usize) -> Point3<Real> {
        self.vertices[v].pos
    }

    /// The three corner positions of face `f`.
    #[inline]
    pub fn triangle(&self, f: usize) -> [Point3<Real>; 3] {
        self.faces[f].vertices.map(|v| self.vertices[v].pos)
    }

    /// Unit normal of face `f`, or zero for a degenerate face.
    pub fn face_normal(&self, f: usize) -> Vector3<Real> {
        let [a, b, c] = self.triangle(f);
        (b - a)
            .cross(&(c - a))
            .try_normalize(Real::EPSILON)
            .unwrap_or_else(Vector3::zeros)
    }

    pub fn barycenter(&self, f: usize) -> Point3<Real> {
        let [a, b, c] = self.triangle(f);
        Point3::from((a.coords + b.coords + c.coords) / 3.0)
    }

    pub fn max_edge_length(&self, f: usize) -> Real {
        let [a, b, c] = self.triangle(f);
        (b - a).norm().max((c - b).norm()).max((a - c).norm())
    }

    /// **Mathematical Foundation: Axis-Aligned Bounding Box**
    ///
    /// The AABB is the componentwise min/max over every live vertex referenced by
    /// a live face. It is computed once and cached until the next mutation.
    /// An empty mesh yields a degenerate box at the origin.
    pub fn bounding_box(&self) -> Aabb {
        *self.bounding_box.get_or_init(|| {
            let mut mins = Point3::new(Real::MAX, Real::MAX, Real::MAX);
            let mut maxs = Point3::new(-Real::MAX, -Real::MAX, -Real::MAX);
            let mut any = false;
            for face in self.faces.iter().filter(|f| !f.deleted) {
                for &v in &face.vertices {
                    let p = self.vertices[v].pos;
                    mins = mins.inf(&p);
                    maxs = maxs.sup(&p);
                    any = true;
                }
            }
            if any {
                Aabb::new(mins, maxs)
            } else {
                Aabb::new(Point3::origin(), Point3::origin())
            }
        })
    }

    /// Length of the bounding-box diagonal.
    pub fn diagonal(&self) -> Real {
        let bb = self.bounding_box();
        (bb.maxs - bb.mins).norm()
    }

    /// Invalidates cached bounding box
    pub fn invalidate_bounding_box(&mut self) {
        self.bounding_box = OnceLock::new();
    }

    /// Concatenate `other` after this mesh without merging any vertex.
    ///
    /// Returns the index of the first appended face. Adjacency of the appended faces
    /// is copied with offsets, so the two parts stay disconnected until a rebuild
    /// finds shared vertex indices (which it never will without a vertex merge).
    pub fn append(&mut self, other: &TriMesh) -> usize {
        let vertex_offset = self.vertices.len();
        let face_offset = self.faces.len();
        self.vertices.extend(other.vertices.iter().copied());
        self.faces.extend(other.faces.iter().map(|f| Face {
            vertices: f.vertices.map(|v| v + vertex_offset),
            neighbors: f.neighbors.map(|n| n + face_offset),
            neighbor_edges: f.neighbor_edges,
            deleted: f.deleted,
        }));
        self.invalidate_bounding_box();
        face_offset
    }
}
