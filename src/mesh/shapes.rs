//! Procedural planar meshes used for patch construction and testing

use super::{TriMesh, Vertex};
use crate::float_types::Real;
use nalgebra::{Point3, Vector3};
use std::sync::OnceLock;

impl TriMesh {
    /// **Regular grid in the XY plane**
    ///
    /// `nx × ny` cells of size `dx × dy` starting at `origin`, two counter-clockwise
    /// triangles per cell (normal +Z). Diagonals alternate with the cell parity:
    /// ```text
    ///   (i + j) even      (i + j) odd
    ///   01 ---- 11        01 ---- 11
    ///   |     / |         | \     |
    ///   |   /   |         |   \   |
    ///   00 ---- 10        00 ---- 10
    /// ```
    /// With even `nx` and `ny` no triangle owns two border edges.
    ///
    /// Vertex `(i, j)` has index `j * (nx + 1) + i`.
    pub fn grid(origin: Point3<Real>, nx: usize, ny: usize, dx: Real, dy: Real) -> TriMesh {
        let stride = nx + 1;
        let mut positions = Vec::with_capacity(stride * (ny + 1));
        for j in 0..=ny {
            for i in 0..=nx {
                positions.push(origin + Vector3::new(i as Real * dx, j as Real * dy, 0.0));
            }
        }

        let mut triangles = Vec::with_capacity(2 * nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                let p00 = j * stride + i;
                let p10 = p00 + 1;
                let p01 = p00 + stride;
                let p11 = p01 + 1;
                if (i + j) % 2 == 0 {
                    triangles.push([p00, p10, p11]);
                    triangles.push([p00, p11, p01]);
                } else {
                    triangles.push([p00, p10, p01]);
                    triangles.push([p10, p11, p01]);
                }
            }
        }

        let mut mesh = TriMesh {
            vertices: positions.into_iter().map(Vertex::new).collect(),
            faces: Vec::new(),
            bounding_box: OnceLock::new(),
        };
        for tri in triangles {
            mesh.add_face(tri);
        }
        mesh.rebuild_adjacency();
        mesh
    }

    /// Copy of this mesh moved by `offset`.
    pub fn translated(&self, offset: Vector3<Real>) -> TriMesh {
        let mut mesh = self.clone();
        for v in &mut mesh.vertices {
            v.pos += offset;
        }
        mesh.invalidate_bounding_box();
        mesh
    }

    /// Copy of this mesh with every face wound the other way.
    pub fn flipped(&self) -> TriMesh {
        let mut mesh = self.clone();
        for face in &mut mesh.faces {
            face.vertices.swap(1, 2);
        }
        mesh.rebuild_adjacency();
        mesh
    }
}
