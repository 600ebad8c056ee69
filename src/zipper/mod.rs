//! Zippering of two overlapping open triangle meshes into a single conforming mesh.
//!
//! The engine runs in fixed phases over copies of its inputs:
//!
//! 1. **Redundancy removal**: erosion fronts on both meshes remove faces already
//!    covered by the other mesh ([`redundancy`]).
//! 2. **Patch border refinement**: patch faces with more than one border edge are
//!    split or dropped so every border face owns a single border edge ([`refine`]).
//! 3. **Border walking**: every border edge of the patch is projected onto the base
//!    mesh and the base faces it crosses collect cut chains ([`walker`], [`aux_record`]).
//! 4. **Retriangulation and mutation**: cut base faces are replaced by the
//!    triangulated components that survive the cuts, patch edges that were split are
//!    fanned, and the merged mesh is cleaned ([`stitch`], [`triangulate`]).
//!
//! Local geometric failures never abort the run. They leave a small gap in the
//! output, are logged with `tracing::warn!` and counted in [`ZipperReport`].

use crate::errors::{MeshRole, ZipperError, ZipperResult};
use crate::float_types::{
    DEFAULT_MAX_RESCALE_ATTEMPTS, DEFAULT_MAX_WALK_STEPS, DEFAULT_SAMPLES_PER_EDGE, Real,
    snap_fraction,
};
use crate::mesh::TriMesh;
use crate::traits::PolygonTriangulator;
use nalgebra::Point3;
use tracing::info;

pub mod aux_record;
pub mod grid;
pub mod probe;
pub mod projection;
pub mod redundancy;
pub mod refine;
pub mod stitch;
pub mod triangulate;
pub mod walker;

pub use redundancy::{RedundancySelector, RedundantSelection};
pub use triangulate::EarcutTriangulator;

/// Tunables of one zippering run.
#[derive(Debug, Clone, PartialEq)]
pub struct ZipperParams {
    /// Maximum distance at which the two surfaces are considered overlapping.
    pub tolerance: Real,
    /// Vertex snap distance as a fraction of the merged bounding-box diagonal.
    pub snap_fraction: Real,
    /// Samples per edge for redundancy tests and crossing searches.
    pub samples_per_edge: usize,
    /// Loop guard of a single face walk. The per-edge work budget is twice this.
    pub max_walk_steps: usize,
    /// Retries of the triangulator on a rescaled outline.
    pub max_rescale_attempts: usize,
    /// Seed the patch erosion front with every patch face and accept closed meshes.
    pub full_processing: bool,
    /// Skip the redundancy test for faces facing a surface region close to a hole.
    pub border_distance_prefilter: bool,
    /// Stop after redundancy removal and return both eroded meshes merged.
    pub redundancy_only: bool,
    /// Split or drop patch faces with several border edges before walking.
    pub refine_patch_border: bool,
    /// Erode faces by decreasing per-face quality instead of alternating fronts.
    /// Requires [`Zipper::zip_with_quality`].
    pub use_quality: bool,
}

impl Default for ZipperParams {
    fn default() -> Self {
        ZipperParams {
            tolerance: 0.0,
            snap_fraction: snap_fraction(),
            samples_per_edge: DEFAULT_SAMPLES_PER_EDGE,
            max_walk_steps: DEFAULT_MAX_WALK_STEPS,
            max_rescale_attempts: DEFAULT_MAX_RESCALE_ATTEMPTS,
            full_processing: false,
            border_distance_prefilter: false,
            redundancy_only: false,
            refine_patch_border: true,
            use_quality: false,
        }
    }
}

impl ZipperParams {
    pub fn new(tolerance: Real) -> Self {
        ZipperParams {
            tolerance,
            ..Default::default()
        }
    }

    /// Parameters with a tolerance of 1% of the larger bounding-box diagonal.
    pub fn for_meshes(base: &TriMesh, patch: &TriMesh) -> Self {
        Self::new(0.01 * base.diagonal().max(patch.diagonal()))
    }

    pub const fn with_snap_fraction(mut self, snap_fraction: Real) -> Self {
        self.snap_fraction = snap_fraction;
        self
    }

    pub const fn with_samples_per_edge(mut self, samples: usize) -> Self {
        self.samples_per_edge = samples;
        self
    }

    pub const fn with_max_walk_steps(mut self, steps: usize) -> Self {
        self.max_walk_steps = steps;
        self
    }

    pub const fn with_max_rescale_attempts(mut self, attempts: usize) -> Self {
        self.max_rescale_attempts = attempts;
        self
    }

    pub const fn with_full_processing(mut self, enabled: bool) -> Self {
        self.full_processing = enabled;
        self
    }

    pub const fn with_border_distance_prefilter(mut self, enabled: bool) -> Self {
        self.border_distance_prefilter = enabled;
        self
    }

    pub const fn with_redundancy_only(mut self, enabled: bool) -> Self {
        self.redundancy_only = enabled;
        self
    }

    pub const fn with_refine_patch_border(mut self, enabled: bool) -> Self {
        self.refine_patch_border = enabled;
        self
    }

    pub const fn with_use_quality(mut self, enabled: bool) -> Self {
        self.use_quality = enabled;
        self
    }

    /// Reject values no run can work with.
    pub fn validate(&self) -> ZipperResult<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ZipperError::InvalidTolerance(self.tolerance));
        }
        if !(self.snap_fraction > 0.0 && self.snap_fraction < 1.0) {
            return Err(ZipperError::InvalidParameter {
                name: "snap_fraction",
                reason: format!("must lie in (0, 1), got {}", self.snap_fraction),
            });
        }
        if self.samples_per_edge == 0 {
            return Err(ZipperError::InvalidParameter {
                name: "samples_per_edge",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_walk_steps == 0 {
            return Err(ZipperError::InvalidParameter {
                name: "max_walk_steps",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// What a run did, for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZipperReport {
    pub redundant_base: usize,
    pub redundant_patch: usize,
    pub patch_faces_refined: usize,
    pub border_edges_walked: usize,
    pub vertices_inserted: usize,
    pub faces_retriangulated: usize,
    pub faces_created: usize,
    pub degenerate_dropped: usize,
    /// Uncut base faces dropped because they lie under the patch, behind a cut.
    pub faces_enclosed: usize,
    pub loop_guard_aborts: usize,
}

impl ZipperReport {
    pub const fn redundant_total(&self) -> usize {
        self.redundant_base + self.redundant_patch
    }
}

#[derive(Debug, Clone)]
pub struct ZipperOutput {
    pub mesh: TriMesh,
    pub report: ZipperReport,
}

/// The zippering engine, parameterized by its polygon triangulator.
#[derive(Debug, Clone)]
pub struct Zipper<T: PolygonTriangulator = EarcutTriangulator> {
    params: ZipperParams,
    triangulator: T,
}

impl Zipper<EarcutTriangulator> {
    pub const fn new(params: ZipperParams) -> Self {
        Zipper {
            params,
            triangulator: EarcutTriangulator,
        }
    }
}

impl<T: PolygonTriangulator> Zipper<T> {
    pub const fn with_triangulator(params: ZipperParams, triangulator: T) -> Self {
        Zipper {
            params,
            triangulator,
        }
    }

    pub const fn params(&self) -> &ZipperParams {
        &self.params
    }

    /// Zipper `patch` onto `base`.
    ///
    /// Both inputs are left untouched; the merged mesh is returned with a report.
    /// Only invalid input is an error.
    pub fn zip(&self, base: &TriMesh, patch: &TriMesh) -> ZipperResult<ZipperOutput> {
        self.run(base, patch, None)
    }

    /// [`Zipper::zip`] with one quality value per face slot of each input.
    ///
    /// The values order the redundancy erosion, highest first, when
    /// [`ZipperParams::use_quality`] is set; otherwise they are ignored.
    pub fn zip_with_quality(
        &self,
        base: &TriMesh,
        patch: &TriMesh,
        base_quality: &[Real],
        patch_quality: &[Real],
    ) -> ZipperResult<ZipperOutput> {
        self.run(base, patch, Some((base_quality, patch_quality)))
    }

    fn run(
        &self,
        base: &TriMesh,
        patch: &TriMesh,
        quality: Option<(&[Real], &[Real])>,
    ) -> ZipperResult<ZipperOutput> {
        self.params.validate()?;
        if self.params.use_quality && quality.is_none() {
            return Err(ZipperError::InvalidParameter {
                name: "use_quality",
                reason: "needs per-face quality for both meshes".to_string(),
            });
        }
        if std::ptr::eq(base, patch) {
            return Err(ZipperError::SameMesh);
        }
        for (mesh, role) in [(base, MeshRole::Base), (patch, MeshRole::Patch)] {
            if mesh.face_count() == 0 {
                return Err(ZipperError::EmptyMesh(role));
            }
            if !self.params.full_processing && mesh.border_faces().is_empty() {
                return Err(ZipperError::NoBorderFaces(role));
            }
        }
        let quality = quality.filter(|_| self.params.use_quality);
        if let Some((base_quality, patch_quality)) = quality {
            check_quality(MeshRole::Base, base, base_quality)?;
            check_quality(MeshRole::Patch, patch, patch_quality)?;
        }

        let mut report = ZipperReport::default();
        let mut base = base.clone();
        let mut patch = patch.clone();
        let snap_eps = self.params.snap_fraction * merged_diagonal(&base, &patch);

        let mut selector = RedundancySelector::new(&self.params, snap_eps);
        if let Some((base_quality, patch_quality)) = quality {
            selector = selector.with_quality(base_quality.to_vec(), patch_quality.to_vec());
        }
        let selection = selector.select(&base, &patch);
        report.redundant_base = selection.base_count();
        report.redundant_patch = selection.patch_count();
        selection.apply(&mut base, &mut patch);

        if self.params.redundancy_only {
            base.append(&patch);
            base.compact();
            return Ok(ZipperOutput { mesh: base, report });
        }

        if self.params.refine_patch_border {
            report.patch_faces_refined = refine::refine_border(&mut patch, self.params.max_walk_steps);
        }
        for mesh in [&mut base, &mut patch] {
            report.degenerate_dropped += mesh.clean().degenerate_faces;
        }

        let limit = base.faces.len();
        base.append(&patch);
        let mut mesh = base;

        if limit > 0 && mesh.faces.len() > limit {
            let walk = walker::BorderWalker::new(&mesh, limit, &self.params, snap_eps).run();
            stitch::apply(&mut mesh, walk, &self.triangulator, &self.params, &mut report);
        } else {
            mesh.compact();
        }

        info!(
            vertices = mesh.vertex_count(),
            faces = mesh.face_count(),
            redundant = report.redundant_total(),
            retriangulated = report.faces_retriangulated,
            aborts = report.loop_guard_aborts,
            "zippering finished"
        );
        Ok(ZipperOutput { mesh, report })
    }
}

/// Zipper two meshes with default parameters and the given tolerance.
pub fn zipper(base: &TriMesh, patch: &TriMesh, tolerance: Real) -> ZipperResult<TriMesh> {
    Zipper::new(ZipperParams::new(tolerance))
        .zip(base, patch)
        .map(|out| out.mesh)
}

fn check_quality(role: MeshRole, mesh: &TriMesh, quality: &[Real]) -> ZipperResult<()> {
    let name = match role {
        MeshRole::Base => "base_quality",
        MeshRole::Patch => "patch_quality",
    };
    if quality.len() != mesh.faces.len() {
        return Err(ZipperError::InvalidParameter {
            name,
            reason: format!("has {} values for {} faces", quality.len(), mesh.faces.len()),
        });
    }
    if let Some(f) = quality.iter().position(|q| !q.is_finite()) {
        return Err(ZipperError::InvalidParameter {
            name,
            reason: format!("face {f} has a non-finite quality"),
        });
    }
    Ok(())
}

fn merged_diagonal(a: &TriMesh, b: &TriMesh) -> Real {
    let (ba, bb) = (a.bounding_box(), b.bounding_box());
    let mins: Point3<Real> = ba.mins.inf(&bb.mins);
    let maxs: Point3<Real> = ba.maxs.sup(&bb.maxs);
    (maxs - mins).norm()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> TriMesh {
        TriMesh::grid(Point3::origin(), 2, 2, 0.5, 0.5)
    }

    #[test]
    fn test_params_validation() {
        assert!(ZipperParams::new(0.1).validate().is_ok());
        assert_eq!(
            ZipperParams::new(0.0).validate(),
            Err(ZipperError::InvalidTolerance(0.0))
        );
        assert!(matches!(
            ZipperParams::new(Real::NAN).validate(),
            Err(ZipperError::InvalidTolerance(_))
        ));
        assert!(matches!(
            ZipperParams::new(0.1).with_samples_per_edge(0).validate(),
            Err(ZipperError::InvalidParameter {
                name: "samples_per_edge",
                ..
            })
        ));
        assert!(matches!(
            ZipperParams::new(0.1).with_snap_fraction(2.0).validate(),
            Err(ZipperError::InvalidParameter { name: "snap_fraction", .. })
        ));
    }

    #[test]
    fn test_for_meshes_uses_larger_diagonal() {
        let small = square();
        let large = TriMesh::grid(Point3::origin(), 2, 2, 3.0, 4.0);
        let params = ZipperParams::for_meshes(&small, &large);
        assert!((params.tolerance - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_input_errors() {
        let a = square();
        let zipper = Zipper::new(ZipperParams::new(0.1));
        assert_eq!(zipper.zip(&a, &a).err(), Some(ZipperError::SameMesh));

        let empty = TriMesh::new();
        assert_eq!(
            zipper.zip(&a, &empty).err(),
            Some(ZipperError::EmptyMesh(MeshRole::Patch))
        );

        // a closed tetrahedron has no border
        let closed = TriMesh::from_indexed(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]],
        )
        .expect("valid tetrahedron");
        assert_eq!(
            zipper.zip(&closed, &a).err(),
            Some(ZipperError::NoBorderFaces(MeshRole::Base))
        );
        let full = Zipper::new(ZipperParams::new(0.1).with_full_processing(true));
        assert!(full.zip(&closed, &a).is_ok());
    }

    #[test]
    fn test_redundancy_only_returns_eroded_union() {
        let base = TriMesh::grid(Point3::origin(), 6, 6, 1.0, 1.0);
        let patch = TriMesh::grid(Point3::new(2.0, 2.0, 0.0), 2, 2, 1.0, 1.0);
        let params = ZipperParams::new(0.1)
            .with_samples_per_edge(10)
            .with_redundancy_only(true);
        let out = Zipper::new(params).zip(&base, &patch).expect("valid input");
        assert_eq!(out.report.redundant_patch, 8);
        assert_eq!(out.report.border_edges_walked, 0);
        assert_eq!(out.mesh.face_count(), base.face_count());
    }

    #[test]
    fn test_quality_input_errors() {
        let base = TriMesh::grid(Point3::origin(), 6, 6, 1.0, 1.0);
        let patch = TriMesh::grid(Point3::new(2.0, 2.0, 0.0), 2, 2, 1.0, 1.0);
        let ranked = Zipper::new(ZipperParams::new(0.1).with_use_quality(true));

        assert!(matches!(
            ranked.zip(&base, &patch),
            Err(ZipperError::InvalidParameter { name: "use_quality", .. })
        ));
        let base_quality = vec![1.0; base.faces.len()];
        assert!(matches!(
            ranked.zip_with_quality(&base, &patch, &base_quality, &[1.0; 3]),
            Err(ZipperError::InvalidParameter { name: "patch_quality", .. })
        ));
        let mut patch_quality = vec![1.0; patch.faces.len()];
        patch_quality[2] = Real::NAN;
        assert!(matches!(
            ranked.zip_with_quality(&base, &patch, &base_quality, &patch_quality),
            Err(ZipperError::InvalidParameter { name: "patch_quality", .. })
        ));

        // without the flag the values are not looked at
        let plain = Zipper::new(ZipperParams::new(0.1).with_samples_per_edge(10));
        assert!(plain.zip_with_quality(&base, &patch, &[], &[]).is_ok());
    }

    #[test]
    fn test_quality_run_matches_alternating_result() {
        let base = TriMesh::grid(Point3::origin(), 6, 6, 1.0, 1.0);
        let patch = TriMesh::grid(Point3::new(2.0, 2.0, 0.0), 2, 2, 1.0, 1.0);
        let params = ZipperParams::new(0.1).with_samples_per_edge(10);
        let base_quality = vec![0.5; base.faces.len()];
        let patch_quality: Vec<Real> = (0..patch.faces.len()).map(|f| f as Real).collect();

        let plain = Zipper::new(params.clone()).zip(&base, &patch).expect("valid input");
        let ranked = Zipper::new(params.with_use_quality(true))
            .zip_with_quality(&base, &patch, &base_quality, &patch_quality)
            .expect("valid input");
        assert_eq!(ranked.report, plain.report);
        assert_eq!(ranked.mesh.to_indexed(), plain.mesh.to_indexed());
    }
}
