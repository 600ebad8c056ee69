//! Zippering errors

use crate::float_types::Real;
use nalgebra::Point3;

/// Which of the two input meshes an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshRole {
    /// The base surface (mesh A), the one that keeps its holes closed by the patch.
    Base,
    /// The patch surface (mesh B).
    Patch,
}

impl std::fmt::Display for MeshRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeshRole::Base => write!(f, "base mesh"),
            MeshRole::Patch => write!(f, "patch mesh"),
        }
    }
}

/// All the fatal problems a zippering run can report.
///
/// Geometric trouble inside the run (walks that do not converge, outlines that
/// refuse to triangulate) is never an error: it is logged and counted in the
/// report instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ZipperError {
    /// The distance tolerance must be a finite, strictly positive number
    #[error("(InvalidTolerance) tolerance must be finite and > 0, got {0}")]
    InvalidTolerance(Real),

    /// A numeric parameter is out of its allowed range
    #[error("(InvalidParameter) {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// The same mesh was passed as base and patch
    #[error("(SameMesh) zippering needs two distinct meshes")]
    SameMesh,

    /// A mesh has no live faces
    #[error("(EmptyMesh) the {0} has no faces")]
    EmptyMesh(MeshRole),

    /// A mesh has no border faces and full processing was not requested
    #[error("(NoBorderFaces) the {0} has no border faces; enable full processing to zipper closed meshes")]
    NoBorderFaces(MeshRole),

    /// A face references a vertex that does not exist
    #[error("(VertexIndexOutOfRange) face {face} references vertex {index}, mesh has {count} vertices")]
    VertexIndexOutOfRange { face: usize, index: usize, count: usize },

    /// A face uses the same vertex twice
    #[error("(RepeatedFaceIndex) face {face} repeats vertex {index}")]
    RepeatedFaceIndex { face: usize, index: usize },

    /// A vertex coordinate is NaN or infinite
    #[error("(InvalidCoordinate) vertex {index} has a NaN or infinite coordinate ({point})")]
    InvalidCoordinate { index: usize, point: Point3<Real> },
}

/// Result alias used throughout the crate.
pub type ZipperResult<T> = Result<T, ZipperError>;
