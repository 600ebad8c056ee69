//! Face-face adjacency, border navigation and border distances.

use super::{Face, TriMesh};
use crate::float_types::Real;
use hashbrown::{HashMap, HashSet};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A position on the mesh: a face, one of its edges, and one endpoint of that edge.
///
/// This is the classic half-edge-free navigation primitive over face-face adjacency.
/// On a border edge, [`BorderPos::next_border`] moves to the following border edge
/// of the same boundary loop, so a loop can be walked without auxiliary storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BorderPos {
    pub face: usize,
    pub edge: usize,
    pub vertex: usize,
}

impl BorderPos {
    /// Position on edge `edge` of `face`, anchored at the edge's first vertex.
    pub fn new(mesh: &TriMesh, face: usize, edge: usize) -> Self {
        BorderPos {
            face,
            edge,
            vertex: mesh.faces[face].vertices[edge],
        }
    }

    /// Move to the other endpoint of the current edge.
    pub fn flip_v(&mut self, mesh: &TriMesh) {
        let (a, b) = mesh.faces[self.face].edge(self.edge);
        self.vertex = if self.vertex == a { b } else { a };
    }

    /// Switch to the other edge of the current face that contains the current vertex.
    pub fn flip_e(&mut self, mesh: &TriMesh) {
        let f = &mesh.faces[self.face];
        self.edge = if f.vertices[(self.edge + 1) % 3] == self.vertex {
            (self.edge + 1) % 3
        } else {
            (self.edge + 2) % 3
        };
    }

    /// Cross the current edge into the neighboring face. A no-op on border edges.
    pub fn flip_f(&mut self, mesh: &TriMesh) {
        let f = &mesh.faces[self.face];
        let (nf, ne) = (f.neighbors[self.edge], f.neighbor_edges[self.edge]);
        self.face = nf;
        self.edge = ne;
    }

    pub fn is_border(&self, mesh: &TriMesh) -> bool {
        mesh.is_border_edge(self.face, self.edge)
    }

    /// From a border edge, rotate around the current vertex to the next border edge
    /// and move to its far endpoint.
    ///
    /// Returns `false` when no other border edge is found within one full turn
    /// (a non-manifold fan), leaving the position unchanged.
    pub fn next_border(&mut self, mesh: &TriMesh) -> bool {
        let start = *self;
        // a fan around one vertex cannot hold more faces than the mesh
        for _ in 0..=mesh.faces.len() {
            self.flip_e(mesh);
            self.flip_f(mesh);
            if self.is_border(mesh) {
                self.flip_v(mesh);
                return true;
            }
            if self.face == start.face && self.edge == start.edge {
                break;
            }
        }
        *self = start;
        false
    }
}

/// One boundary loop as the ordered list of `(face, edge)` border edges.
pub type BorderLoop = Vec<(usize, usize)>;

impl TriMesh {
    /// Rebuild face-face adjacency from scratch over live faces.
    ///
    /// An edge used by exactly two live faces links them; an edge used by one face,
    /// or by three or more, is left as a border edge on every face that uses it.
    pub fn rebuild_adjacency(&mut self) {
        let mut edges: HashMap<(usize, usize), Vec<(usize, usize)>> = HashMap::new();
        for (fi, face) in self.faces.iter_mut().enumerate() {
            *face = Face {
                neighbors: [fi; 3],
                neighbor_edges: [0, 1, 2],
                ..*face
            };
            if face.deleted {
                continue;
            }
            for e in 0..3 {
                let (a, b) = face.edge(e);
                let key = if a < b { (a, b) } else { (b, a) };
                edges.entry(key).or_default().push((fi, e));
            }
        }

        for uses in edges.values() {
            if let [(f0, e0), (f1, e1)] = uses.as_slice() {
                self.faces[*f0].neighbors[*e0] = *f1;
                self.faces[*f0].neighbor_edges[*e0] = *e1;
                self.faces[*f1].neighbors[*e1] = *f0;
                self.faces[*f1].neighbor_edges[*e1] = *e0;
            }
        }
    }

    #[inline]
    pub fn is_border_edge(&self, f: usize, e: usize) -> bool {
        self.faces[f].neighbors[e] == f
    }

    pub fn border_edge_count(&self, f: usize) -> usize {
        (0..3).filter(|&e| self.is_border_edge(f, e)).count()
    }

    /// Live faces with at least one border edge.
    pub fn border_faces(&self) -> Vec<usize> {
        self.live_faces()
            .filter(|&f| self.border_edge_count(f) > 0)
            .collect()
    }

    /// Total number of border edges over live faces.
    pub fn border_edge_total(&self) -> usize {
        self.live_faces().map(|f| self.border_edge_count(f)).sum()
    }

    /// Whether the vertex at `corner` of face `f` touches the boundary.
    ///
    /// Rotates around the vertex through face-face adjacency. An edge counts as border
    /// when it is a real border edge or when the face across it is `blocked`
    /// (faces already chosen for removal behave as if they were gone).
    pub fn is_border_vertex(&self, f: usize, corner: usize, blocked: &dyn Fn(usize) -> bool) -> bool {
        let open = |pos: &BorderPos| {
            pos.is_border(self) || blocked(self.faces[pos.face].neighbors[pos.edge])
        };
        let mut pos = BorderPos::new(self, f, corner);
        for _ in 0..=self.faces.len() {
            if open(&pos) {
                return true;
            }
            pos.flip_e(self);
            if open(&pos) {
                return true;
            }
            pos.flip_f(self);
            if pos.face == f {
                return false;
            }
        }
        false
    }

    /// Enumerate every boundary loop of the mesh.
    ///
    /// Each loop starts at the lowest-indexed unvisited border edge and follows
    /// [`BorderPos::next_border`]. A loop that cannot be closed (non-manifold vertex)
    /// is returned as the open run that was walked.
    pub fn border_loops(&self) -> Vec<BorderLoop> {
        let mut visited: HashSet<(usize, usize)> = HashSet::new();
        let mut loops = Vec::new();

        for f in self.live_faces() {
            for e in 0..3 {
                if !self.is_border_edge(f, e) || visited.contains(&(f, e)) {
                    continue;
                }
                let mut border_loop = Vec::new();
                // anchor at the far endpoint so that next_border rotates around it
                let mut pos = BorderPos::new(self, f, e);
                pos.flip_v(self);
                let start = (f, e);
                loop {
                    let key = (pos.face, pos.edge);
                    if !visited.insert(key) {
                        break;
                    }
                    border_loop.push(key);
                    if !pos.next_border(self) || (pos.face, pos.edge) == start {
                        break;
                    }
                }
                loops.push(border_loop);
            }
        }
        loops
    }

    /// **Geodesic distance from border**
    ///
    /// Dijkstra over mesh edges seeded with every border vertex at distance 0.
    /// Vertices not connected to any border (closed components, unreferenced
    /// vertices) keep `Real::MAX`.
    pub fn border_distances(&self) -> Vec<Real> {
        #[derive(PartialEq)]
        struct Entry(Real, usize);
        impl Eq for Entry {}
        impl PartialOrd for Entry {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }
        impl Ord for Entry {
            fn cmp(&self, other: &Self) -> Ordering {
                // min-heap on distance
                other.0.total_cmp(&self.0).then_with(|| other.1.cmp(&self.1))
            }
        }

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); self.vertices.len()];
        let mut dist = vec![Real::MAX; self.vertices.len()];
        let mut heap = BinaryHeap::new();

        for f in self.live_faces() {
            let face = &self.faces[f];
            for e in 0..3 {
                let (a, b) = face.edge(e);
                adjacency[a].push(b);
                adjacency[b].push(a);
                if self.is_border_edge(f, e) {
                    for v in [a, b] {
                        if dist[v] > 0.0 {
                            dist[v] = 0.0;
                            heap.push(Entry(0.0, v));
                        }
                    }
                }
            }
        }

        while let Some(Entry(d, v)) = heap.pop() {
            if d > dist[v] {
                continue;
            }
            for &w in &adjacency[v] {
                let nd = d + (self.vertices[w].pos - self.vertices[v].pos).norm();
                if nd < dist[w] {
                    dist[w] = nd;
                    heap.push(Entry(nd, w));
                }
            }
        }
        dist
    }
}

#[cfg(test)]
mod tests {
    use crate::mesh::TriMesh;
    use nalgebra::Point3;

    #[test]
    fn test_grid_border_loop_walks_whole_perimeter() {
        let mesh = TriMesh::grid(Point3::origin(), 4, 4, 0.25, 0.25);
        let loops = mesh.border_loops();
        assert_eq!(loops.len(), 1, "a grid has one boundary");
        assert_eq!(loops[0].len(), 16, "4 cells per side");
        assert_eq!(mesh.border_edge_total(), 16);
    }

    #[test]
    fn test_hole_gives_second_loop() {
        let mut mesh = TriMesh::grid(Point3::origin(), 4, 4, 1.0, 1.0);
        // delete both triangles of an interior cell
        let center = Point3::new(1.5, 1.5, 0.0);
        let doomed: Vec<usize> = mesh
            .live_faces()
            .filter(|&f| {
                let c = mesh.barycenter(f);
                (c.x - center.x).abs() < 0.5 && (c.y - center.y).abs() < 0.5
            })
            .collect();
        assert_eq!(doomed.len(), 2);
        for f in doomed {
            mesh.delete_face(f);
        }
        let mut sizes: Vec<usize> = mesh.border_loops().iter().map(|l| l.len()).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![4, 16]);
    }

    #[test]
    fn test_border_vertex_detection_and_distances() {
        let mesh = TriMesh::grid(Point3::origin(), 2, 2, 1.0, 1.0);
        let center = mesh
            .vertices
            .iter()
            .position(|v| (v.pos - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-12)
            .expect("center vertex");
        let f = mesh
            .live_faces()
            .find(|&f| mesh.faces[f].vertices.contains(&center))
            .expect("face around center");
        let corner = mesh.faces[f].corner_of(center).expect("corner");
        assert!(!mesh.is_border_vertex(f, corner, &|_| false));
        assert!(mesh.is_border_vertex(f, corner, &|g| g != f));

        let dist = mesh.border_distances();
        assert!((dist[center] - 1.0).abs() < 1e-12);
        assert_eq!(dist.iter().filter(|&&d| d == 0.0).count(), 8);
    }
}
