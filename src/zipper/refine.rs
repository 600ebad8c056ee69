//! Patch border refinement: leave every face with at most one border edge.

use crate::mesh::TriMesh;
use hashbrown::HashSet;
use tracing::debug;

enum Action {
    /// Split a face and its only interior neighbor at the midpoint of their shared edge.
    Split { face: usize, edge: usize },
    /// Drop a face whose three edges are all border edges.
    Drop(usize),
}

/// Split every face with two border edges through the midpoint of its interior edge
/// (together with the face across that edge) and drop isolated faces, until no face
/// has more than one border edge or `max_passes` is reached.
///
/// Returns the number of faces split or dropped. Adjacency is rebuilt after every
/// pass; new vertices are appended and nothing is compacted.
pub fn refine_border(mesh: &mut TriMesh, max_passes: usize) -> usize {
    let mut changed = 0;
    for pass in 0..max_passes {
        let actions = plan(mesh);
        if actions.is_empty() {
            break;
        }
        debug!(pass, actions = actions.len(), "refining patch border");
        for action in actions {
            match action {
                Action::Drop(f) => mesh.delete_face(f),
                Action::Split { face, edge } => split(mesh, face, edge),
            }
            changed += 1;
        }
        mesh.rebuild_adjacency();
    }
    changed
}

/// Collect one pass of independent actions on fresh adjacency.
fn plan(mesh: &TriMesh) -> Vec<Action> {
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut actions = Vec::new();
    for f in mesh.live_faces() {
        match mesh.border_edge_count(f) {
            3 => {
                claimed.insert(f);
                actions.push(Action::Drop(f));
            },
            2 => {
                let Some(edge) = (0..3).find(|&e| !mesh.is_border_edge(f, e)) else {
                    continue;
                };
                let g = mesh.faces[f].neighbors[edge];
                if claimed.contains(&f) || claimed.contains(&g) {
                    continue;
                }
                claimed.insert(f);
                claimed.insert(g);
                actions.push(Action::Split { face: f, edge });
            },
            _ => {},
        }
    }
    actions
}

fn split(mesh: &mut TriMesh, f: usize, j: usize) {
    let face = mesh.faces[f];
    let (g, gj) = (face.neighbors[j], face.neighbor_edges[j]);
    let [a, b, c] = [0, 1, 2].map(|k| face.vertices[(j + k) % 3]);
    let d = mesh.faces[g].vertices[(gj + 2) % 3];

    let m = mesh.add_vertex(nalgebra::center(&mesh.position(a), &mesh.position(b)));
    mesh.delete_face(f);
    mesh.delete_face(g);
    mesh.add_face([a, m, c]);
    mesh.add_face([m, b, c]);
    mesh.add_face([b, m, d]);
    mesh.add_face([m, a, d]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn strip() -> TriMesh {
        TriMesh::from_indexed(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .expect("valid strip")
    }

    #[test]
    fn test_two_triangle_strip_is_split_into_four() {
        let mut mesh = strip();
        assert_eq!(refine_border(&mut mesh, 10), 1);
        assert_eq!(mesh.face_count(), 4);
        assert_eq!(mesh.vertex_count(), 5);
        assert!(mesh.live_faces().all(|f| mesh.border_edge_count(f) <= 1));
        assert_eq!(mesh.border_edge_total(), 4);
        let centre = mesh.position(4);
        assert!((centre - Point3::new(0.5, 0.5, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_isolated_face_is_dropped() {
        let mut mesh = TriMesh::from_indexed(
            vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
            vec![[0, 1, 2]],
        )
        .expect("valid triangle");
        assert_eq!(refine_border(&mut mesh, 10), 1);
        assert_eq!(mesh.face_count(), 0);
    }

    #[test]
    fn test_even_grid_is_left_alone() {
        let mut mesh = TriMesh::grid(Point3::origin(), 4, 4, 0.25, 0.25);
        assert_eq!(refine_border(&mut mesh, 10), 0);
        assert_eq!(mesh.face_count(), 32);
    }
}
