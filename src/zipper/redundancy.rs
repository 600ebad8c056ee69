//! Erosion of faces that are already covered by the other mesh.

use super::ZipperParams;
use super::grid::FaceGrid;
use super::probe::Surface;
use super::projection::sample_segment;
use crate::errors::MeshRole;
use crate::float_types::Real;
use crate::mesh::TriMesh;
use crate::traits::SpatialIndex;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use tracing::{debug, info};

const BASE: usize = 0;
const PATCH: usize = 1;

/// Faces chosen for removal, per mesh. Masks are indexed by face index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedundantSelection {
    pub base: Vec<bool>,
    pub patch: Vec<bool>,
    /// Selected faces in the order the erosion removed them.
    pub order: Vec<(MeshRole, usize)>,
}

impl RedundantSelection {
    pub fn base_count(&self) -> usize {
        self.base.iter().filter(|&&s| s).count()
    }

    pub fn patch_count(&self) -> usize {
        self.patch.iter().filter(|&&s| s).count()
    }

    pub fn count(&self) -> usize {
        self.base_count() + self.patch_count()
    }

    /// Delete the selected faces from both meshes and compact them.
    pub fn apply(&self, base: &mut TriMesh, patch: &mut TriMesh) {
        for (mesh, mask) in [(base, &self.base), (patch, &self.patch)] {
            for (f, _) in mask.iter().enumerate().filter(|(_, s)| **s) {
                mesh.delete_face(f);
            }
            mesh.remove_unreferenced_vertices();
            mesh.compact();
        }
    }
}

/// **Erosion-front redundancy test**
///
/// A face is redundant when its whole area lies within `tolerance` of the other
/// mesh's interior: every sample on its three edges finds a closest point on the
/// other mesh, and none of those closest points touches that mesh's border.
///
/// ## **Algorithm**
/// 1. Seed one front per mesh with its border faces (every patch face in full processing)
/// 2. Pop faces alternately from the two fronts, or by decreasing face quality when
///    quality arrays are given
/// 3. When a face is redundant, mark it and queue its neighbors on the same front
/// 4. Stop when both fronts are empty
///
/// Faces already selected on the other mesh are invisible to the probes and the edges
/// facing them count as border, so the two fronts never eat through each other.
///
/// A base face is also kept when one of its edges toward a kept base face lies
/// entirely over the patch interior: removing it would leave a base border inside
/// the patch, and only patch borders get stitched.
#[derive(Debug, Clone)]
pub struct RedundancySelector {
    tolerance: Real,
    snap_eps: Real,
    samples_per_edge: usize,
    full_processing: bool,
    prefilter: bool,
    quality: Option<[Vec<Real>; 2]>,
}

/// Priority-queue entry of the quality-ordered erosion.
#[derive(Debug, Clone, Copy)]
struct Ranked {
    quality: Real,
    side: usize,
    face: usize,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        // max-heap on quality; ties go to the patch, then to the lower face index
        self.quality
            .total_cmp(&other.quality)
            .then_with(|| self.side.cmp(&other.side))
            .then_with(|| other.face.cmp(&self.face))
    }
}

/// Working state shared by both erosion orders.
struct Erosion<'a> {
    meshes: [&'a TriMesh; 2],
    grids: [FaceGrid; 2],
    distances: Option<[Vec<Real>; 2]>,
    masks: [Vec<bool>; 2],
    order: Vec<(MeshRole, usize)>,
}

impl Erosion<'_> {
    /// Unselected neighbors of `f` on its own mesh.
    fn fresh_neighbors(&self, side: usize, f: usize) -> impl Iterator<Item = usize> + '_ {
        let face = &self.meshes[side].faces[f];
        face.neighbors
            .into_iter()
            .filter(move |&n| n != f && !self.masks[side][n])
    }
}

impl RedundancySelector {
    pub fn new(params: &ZipperParams, snap_eps: Real) -> Self {
        RedundancySelector {
            tolerance: params.tolerance,
            snap_eps,
            samples_per_edge: params.samples_per_edge,
            full_processing: params.full_processing,
            prefilter: params.border_distance_prefilter,
            quality: None,
        }
    }

    /// Pop faces by decreasing quality from one queue shared by both meshes.
    ///
    /// Both arrays are indexed by face index of their mesh.
    pub fn with_quality(mut self, base: Vec<Real>, patch: Vec<Real>) -> Self {
        self.quality = Some([base, patch]);
        self
    }

    /// Run the erosion on both meshes without modifying them.
    pub fn select(&self, base: &TriMesh, patch: &TriMesh) -> RedundantSelection {
        let mut erosion = Erosion {
            meshes: [base, patch],
            grids: [
                FaceGrid::build(base, 0..base.faces.len()),
                FaceGrid::build(patch, 0..patch.faces.len()),
            ],
            distances: self
                .prefilter
                .then(|| [base.border_distances(), patch.border_distances()]),
            masks: [vec![false; base.faces.len()], vec![false; patch.faces.len()]],
            order: Vec::new(),
        };

        let seeds = [
            base.border_faces(),
            if self.full_processing {
                patch.live_faces().collect()
            } else {
                patch.border_faces()
            },
        ];
        debug!(
            base_seeds = seeds[BASE].len(),
            patch_seeds = seeds[PATCH].len(),
            by_quality = self.quality.is_some(),
            "redundancy fronts seeded"
        );

        match &self.quality {
            Some(quality) => self.erode_by_quality(&mut erosion, seeds, quality),
            None => self.erode_alternating(&mut erosion, seeds),
        }

        let [base_mask, patch_mask] = erosion.masks;
        let selection = RedundantSelection {
            base: base_mask,
            patch: patch_mask,
            order: erosion.order,
        };
        info!(
            base = selection.base_count(),
            patch = selection.patch_count(),
            "redundant faces selected"
        );
        selection
    }

    fn erode_alternating(&self, erosion: &mut Erosion<'_>, seeds: [Vec<usize>; 2]) {
        let mut fronts: [VecDeque<usize>; 2] = seeds.map(VecDeque::from);
        let mut side = PATCH;
        loop {
            if fronts[side].is_empty() {
                side = 1 - side;
            }
            let Some(f) = fronts[side].pop_front() else {
                break;
            };
            if self.try_remove(erosion, side, f) {
                fronts[side].extend(erosion.fresh_neighbors(side, f));
            }
            side = 1 - side;
        }
    }

    fn erode_by_quality(
        &self,
        erosion: &mut Erosion<'_>,
        seeds: [Vec<usize>; 2],
        quality: &[Vec<Real>; 2],
    ) {
        let rank = |side: usize, face: usize| Ranked {
            quality: quality[side][face],
            side,
            face,
        };
        let mut heap: BinaryHeap<Ranked> = seeds
            .iter()
            .enumerate()
            .flat_map(|(side, faces)| faces.iter().map(move |&f| rank(side, f)))
            .collect();

        while let Some(Ranked { side, face, .. }) = heap.pop() {
            if self.try_remove(erosion, side, face) {
                heap.extend(erosion.fresh_neighbors(side, face).map(|n| rank(side, n)));
            }
        }
    }

    /// Test face `f` of mesh `side` against the other mesh and select it when redundant.
    fn try_remove(&self, erosion: &mut Erosion<'_>, side: usize, f: usize) -> bool {
        let mesh = erosion.meshes[side];
        if erosion.masks[side][f] || mesh.faces[f].deleted {
            return false;
        }
        let other = 1 - side;

        let redundant = {
            let other_mask = &erosion.masks[other];
            let blocked = |g: usize| other_mask[g];
            let surface = Surface {
                mesh: erosion.meshes[other],
                index: &erosion.grids[other],
                radius: self.tolerance,
                snap_eps: self.snap_eps,
                blocked: &blocked,
            };

            let near_hole = erosion
                .distances
                .as_ref()
                .is_some_and(|d| self.near_hole(mesh, f, &surface, &d[other]));

            !near_hole
                && self.is_redundant(mesh, f, &surface)
                && !(side == BASE && self.exposes_covered_edge(mesh, f, &erosion.masks[side], &surface))
        };

        if redundant {
            erosion.masks[side][f] = true;
            let role = if side == BASE { MeshRole::Base } else { MeshRole::Patch };
            erosion.order.push((role, f));
        }
        redundant
    }

    /// Expensive test: every edge sample must land on the open interior of the surface.
    pub fn is_redundant<I: SpatialIndex>(&self, mesh: &TriMesh, f: usize, surface: &Surface<'_, I>) -> bool {
        let tri = mesh.triangle(f);
        let covered = |p: &nalgebra::Point3<Real>| surface.probe(p).is_good();

        // corners first, they reject most candidates
        if !tri.iter().all(|p| covered(p)) {
            return false;
        }
        (0..3).all(|e| {
            sample_segment(tri[e], tri[(e + 1) % 3], self.samples_per_edge)
                .all(|p| covered(&p))
        })
    }

    /// Whether an edge between `f` and an unselected neighbor lies wholly over the
    /// open interior of the surface.
    fn exposes_covered_edge<I: SpatialIndex>(
        &self,
        mesh: &TriMesh,
        f: usize,
        mask: &[bool],
        surface: &Surface<'_, I>,
    ) -> bool {
        let face = &mesh.faces[f];
        let tri = mesh.triangle(f);
        let exposed = (0..3).find(|&e| {
            let n = face.neighbors[e];
            n != f
                && !mask[n]
                && sample_segment(tri[e], tri[(e + 1) % 3], self.samples_per_edge)
                    .all(|p| surface.probe(&p).is_good())
        });
        if let Some(edge) = exposed {
            debug!(face = f, edge, "base face kept, removal would open an edge under the patch");
        }
        exposed.is_some()
    }

    /// Cheap pre-pass: the surface facing this face is closer to a hole than the face is wide.
    fn near_hole<I: SpatialIndex>(
        &self,
        mesh: &TriMesh,
        f: usize,
        surface: &Surface<'_, I>,
        distances: &[Real],
    ) -> bool {
        match surface.probe(&mesh.barycenter(f)).hit {
            None => true,
            Some(hit) => {
                let nearest = surface.mesh.faces[hit.face]
                    .vertices
                    .iter()
                    .map(|&v| distances[v])
                    .fold(Real::MAX, Real::min);
                nearest <= mesh.max_edge_length(f)
            },
        }
    }
}
