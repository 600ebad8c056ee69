//! **Mesh zippering**: merge two overlapping, open triangle meshes of the same surface
//! into one connected triangle mesh.
//!
//! The *base* mesh is kept as it is wherever it covers the surface; the *patch* mesh
//! fills in what the base is missing. Faces of either mesh that are fully covered by
//! the other are removed, the patch border is walked across the base, and every base
//! face the border passes through is cut and re-triangulated so the two meshes share
//! vertices along one seam.
//!
//! ```no_run
//! use meshzip::{TriMesh, Zipper, ZipperParams};
//! use nalgebra::Point3;
//!
//! let base = TriMesh::grid(Point3::origin(), 4, 4, 0.25, 0.25);
//! let patch = TriMesh::grid(Point3::new(0.8, -0.1, 0.0), 4, 4, 0.25, 0.25);
//!
//! let zipper = Zipper::new(ZipperParams::new(0.02));
//! let out = zipper.zip(&base, &patch).expect("valid inputs");
//! println!("{} faces, {:?}", out.mesh.face_count(), out.report);
//! ```
//!
//! # Features
//! #### Default
//! - **f64**: use f64 as Real
//!
//! #### Optional
//! - **f32**: use f32 as Real, this conflicts with f64

#![forbid(unsafe_code)]
#![warn(clippy::approx_constant, clippy::all)]

pub mod errors;
pub mod float_types;
pub mod mesh;
pub mod traits;
pub mod zipper;

#[cfg(any(all(feature = "f64", feature = "f32"), not(any(feature = "f64", feature = "f32"))))]
compile_error!("Either 'f64' or 'f32' feature must be specified, but not both");

pub use errors::{MeshRole, ZipperError, ZipperResult};
pub use mesh::TriMesh;
pub use traits::{PolygonTriangulator, SpatialIndex};
pub use zipper::{EarcutTriangulator, Zipper, ZipperOutput, ZipperParams, ZipperReport, zipper};
