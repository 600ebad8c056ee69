//! Apply a border walk to the merged mesh.

use super::aux_record::AuxRecord;
use super::grid::FaceGrid;
use super::triangulate::triangulate_record;
use super::walker::WalkOutcome;
use super::{ZipperParams, ZipperReport};
use crate::float_types::Real;
use crate::mesh::TriMesh;
use crate::traits::{PolygonTriangulator, SpatialIndex};
use hashbrown::HashSet;
use tracing::{debug, info};

/// Commit a [`WalkOutcome`]: add and move vertices, replace cut base faces with the
/// triangulation of what they keep, drop uncut base faces enclosed by discarded
/// pieces, fan split patch faces, then clean and compact.
///
/// A cut face whose outline cannot be triangulated is left as it was and counted as a
/// loop-guard abort.
pub fn apply<T: PolygonTriangulator + ?Sized>(
    mesh: &mut TriMesh,
    walk: WalkOutcome,
    triangulator: &T,
    params: &ZipperParams,
    report: &mut ZipperReport,
) {
    let WalkOutcome {
        limit,
        new_vertices,
        moved,
        mut records,
        removed,
        fans,
        edges_walked,
        aborts,
    } = walk;
    report.border_edges_walked += edges_walked;
    report.loop_guard_aborts += aborts;

    let first_new = mesh.vertices.len();
    for p in new_vertices {
        mesh.add_vertex(p);
    }
    for (v, p) in moved {
        mesh.vertices[v].pos = p;
    }
    mesh.invalidate_bounding_box();

    let mut cut_faces: Vec<usize> = records.keys().copied().collect();
    cut_faces.sort_unstable();
    let mut finished: Vec<(usize, AuxRecord)> = Vec::with_capacity(cut_faces.len());
    for f in cut_faces {
        if let Some(mut record) = records.remove(&f) {
            record.finish(&mut |p| mesh.add_vertex(p));
            finished.push((f, record));
        }
    }
    let enclosed = enclosed_faces(mesh, limit, &finished, params.tolerance);

    let mut created: Vec<[usize; 3]> = Vec::new();
    for (f, record) in &finished {
        if !record.is_modified() {
            continue;
        }
        match triangulate_record(triangulator, record, params.max_rescale_attempts) {
            Some(triangles) => {
                mesh.delete_face(*f);
                created.extend(triangles);
                report.faces_retriangulated += 1;
            },
            None => report.loop_guard_aborts += 1,
        }
    }

    for &f in &enclosed {
        mesh.delete_face(f);
    }
    report.faces_enclosed += enclosed.len();
    for f in removed {
        mesh.delete_face(f);
    }
    created.extend(fans);
    report.faces_created += created.len();
    for triangle in created {
        mesh.add_face(triangle);
    }

    let (stats, inserted) = mesh.clean_counting_from(first_new);
    report.vertices_inserted += inserted;
    report.degenerate_dropped += stats.degenerate_faces;
    info!(
        retriangulated = report.faces_retriangulated,
        enclosed = enclosed.len(),
        created = report.faces_created,
        merged_vertices = stats.merged_vertices,
        degenerate = stats.degenerate_faces,
        "stitch applied"
    );
}

/// Uncut base faces reached from a cut face through an edge lying wholly on its
/// discarded side, flooding over uncut base faces covered by the patch.
///
/// The flood stops at cut faces, at the base border, and at faces whose barycenter
/// has no patch face within `tolerance`.
fn enclosed_faces(
    mesh: &TriMesh,
    limit: usize,
    finished: &[(usize, AuxRecord)],
    tolerance: Real,
) -> Vec<usize> {
    let cut: HashSet<usize> = finished.iter().map(|(f, _)| *f).collect();
    let mut stack: Vec<usize> = Vec::new();
    for (f, record) in finished {
        if record.cuts_applied() == 0 {
            continue;
        }
        let face = &mesh.faces[*f];
        for e in 0..3 {
            let (a, b) = face.edge(e);
            if record.discards(a) && record.discards(b) {
                stack.push(face.neighbors[e]);
            }
        }
    }
    if stack.is_empty() {
        return Vec::new();
    }

    let patch = FaceGrid::build(mesh, limit..mesh.faces.len());
    let mut enclosed: HashSet<usize> = HashSet::new();
    while let Some(g) = stack.pop() {
        if g >= limit || mesh.faces[g].deleted || cut.contains(&g) || enclosed.contains(&g) {
            continue;
        }
        if patch.closest(&mesh.barycenter(g), tolerance).is_none() {
            debug!(face = g, "discard flood stopped at a face off the patch");
            continue;
        }
        enclosed.insert(g);
        stack.extend(mesh.faces[g].neighbors);
    }

    let mut enclosed: Vec<usize> = enclosed.into_iter().collect();
    enclosed.sort_unstable();
    enclosed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zipper::triangulate::EarcutTriangulator;
    use nalgebra::Point3;

    #[test]
    fn test_welded_new_vertices_are_not_counted() {
        // faces [0, 1, 3] and [0, 3, 2] over the unit square
        let mut mesh = TriMesh::grid(Point3::origin(), 1, 1, 1.0, 1.0);
        let walk = WalkOutcome {
            limit: 2,
            new_vertices: vec![Point3::new(0.5, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)],
            removed: vec![0],
            // vertex 5 lands on vertex 1 and is welded away
            fans: vec![[0, 4, 3], [4, 5, 3]],
            ..Default::default()
        };
        let mut report = ZipperReport::default();
        apply(&mut mesh, walk, &EarcutTriangulator, &ZipperParams::new(0.1), &mut report);

        assert_eq!(report.vertices_inserted, 1);
        assert_eq!(report.faces_created, 2);
        assert_eq!(mesh.vertices.len(), 5);
        assert_eq!(mesh.faces.len(), 3);
        assert!(mesh.adjacency_is_symmetric());
    }

    #[test]
    fn test_no_cuts_means_nothing_enclosed() {
        let mesh = TriMesh::grid(Point3::origin(), 2, 2, 1.0, 1.0);
        assert!(enclosed_faces(&mesh, mesh.faces.len(), &[], 0.1).is_empty());
    }
}
