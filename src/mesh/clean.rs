//! Removal of duplicate and degenerate geometry, and tombstone compaction.

use super::TriMesh;
use crate::float_types::Real;
use hashbrown::{HashMap, HashSet};

/// Bit-exact key of a position; `-0.0` and `0.0` are folded together.
fn position_key(p: &nalgebra::Point3<Real>) -> [u64; 3] {
    [p.x, p.y, p.z].map(|c| {
        let c = if c == 0.0 { 0.0 } else { c };
        (c as f64).to_bits()
    })
}

impl TriMesh {
    /// Merge vertices with bit-identical positions.
    ///
    /// The lowest index of each position survives; faces are redirected to it and the
    /// others are tombstoned. Returns the number of vertices merged away.
    pub fn remove_duplicate_vertices(&mut self) -> usize {
        let mut first: HashMap<[u64; 3], usize> = HashMap::new();
        let mut remap: Vec<usize> = (0..self.vertices.len()).collect();
        let mut merged = 0;

        for (i, v) in self.vertices.iter_mut().enumerate() {
            if v.deleted {
                continue;
            }
            match first.entry(position_key(&v.pos)) {
                hashbrown::hash_map::Entry::Occupied(keep) => {
                    remap[i] = *keep.get();
                    v.deleted = true;
                    merged += 1;
                },
                hashbrown::hash_map::Entry::Vacant(slot) => {
                    slot.insert(i);
                },
            }
        }

        if merged > 0 {
            for face in self.faces.iter_mut().filter(|f| !f.deleted) {
                face.vertices = face.vertices.map(|v| remap[v]);
            }
        }
        merged
    }

    /// Tombstone faces that repeat a vertex index or have (numerically) zero area.
    pub fn remove_degenerate_faces(&mut self) -> usize {
        let mut removed = 0;
        for f in 0..self.faces.len() {
            if self.faces[f].deleted {
                continue;
            }
            let [a, b, c] = self.faces[f].vertices;
            let repeated = a == b || b == c || c == a;
            if repeated || self.is_zero_area(f) {
                self.faces[f].deleted = true;
                removed += 1;
            }
        }
        removed
    }

    fn is_zero_area(&self, f: usize) -> bool {
        let [a, b, c] = self.triangle(f);
        let longest = self.max_edge_length(f);
        (b - a).cross(&(c - a)).norm() <= Real::EPSILON * longest * longest
    }

    /// Tombstone faces that use the same vertex set as an earlier face.
    pub fn remove_duplicate_faces(&mut self) -> usize {
        let mut seen: HashSet<[usize; 3]> = HashSet::new();
        let mut removed = 0;
        for face in self.faces.iter_mut().filter(|f| !f.deleted) {
            let mut key = face.vertices;
            key.sort_unstable();
            if !seen.insert(key) {
                face.deleted = true;
                removed += 1;
            }
        }
        removed
    }

    /// Tombstone vertices that no live face references.
    pub fn remove_unreferenced_vertices(&mut self) -> usize {
        let mut used = vec![false; self.vertices.len()];
        for face in self.faces.iter().filter(|f| !f.deleted) {
            for &v in &face.vertices {
                used[v] = true;
            }
        }
        let mut removed = 0;
        for (v, keep) in self.vertices.iter_mut().zip(used) {
            if !keep && !v.deleted {
                v.deleted = true;
                removed += 1;
            }
        }
        removed
    }

    /// Drop every tombstoned face and vertex, preserving the relative order of the
    /// survivors, and rebuild face-face adjacency.
    pub fn compact(&mut self) {
        let mut remap = vec![usize::MAX; self.vertices.len()];
        let mut next = 0;
        for (i, v) in self.vertices.iter().enumerate() {
            if !v.deleted {
                remap[i] = next;
                next += 1;
            }
        }
        self.vertices.retain(|v| !v.deleted);
        self.faces.retain(|f| !f.deleted);
        for face in &mut self.faces {
            face.vertices = face.vertices.map(|v| remap[v]);
        }
        self.rebuild_adjacency();
        self.invalidate_bounding_box();
    }

    /// The full cleaning pass run after any bulk edit.
    pub fn clean(&mut self) -> CleanStats {
        self.clean_counting_from(self.vertices.len()).0
    }

    /// [`TriMesh::clean`], also returning how many vertices with index `first` or
    /// above survive welding and the unreferenced sweep.
    pub fn clean_counting_from(&mut self, first: usize) -> (CleanStats, usize) {
        let merged_vertices = self.remove_duplicate_vertices();
        let degenerate_faces = self.remove_degenerate_faces();
        let duplicate_faces = self.remove_duplicate_faces();
        let unreferenced_vertices = self.remove_unreferenced_vertices();
        let survivors = self
            .vertices
            .iter()
            .skip(first)
            .filter(|v| !v.deleted)
            .count();
        self.compact();
        let stats = CleanStats {
            merged_vertices,
            degenerate_faces,
            duplicate_faces,
            unreferenced_vertices,
        };
        (stats, survivors)
    }
}

/// Counts reported by [`TriMesh::clean`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanStats {
    pub merged_vertices: usize,
    pub degenerate_faces: usize,
    pub duplicate_faces: usize,
    pub unreferenced_vertices: usize,
}
