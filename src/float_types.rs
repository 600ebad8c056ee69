// Re-export parry for the appropriate float size
#[cfg(feature = "f64")]
pub use parry3d_f64 as parry3d;

#[cfg(feature = "f32")]
pub use parry3d;

// Our Real scalar type:
#[cfg(feature = "f32")]
pub type Real = f32;
#[cfg(feature = "f64")]
pub type Real = f64;

use core::str::FromStr;
use std::sync::OnceLock;

/// Lazily-initialized vertex-snap fraction used when no explicit value is
/// configured. The snap epsilon of a zippering run is this fraction times the
/// bounding-box diagonal of the merged meshes.
///
/// Defaults depend on precision (`f32` vs `f64`), but can be overridden:
///  1) **Build-time**: set env var `MESHZIP_SNAP_FRACTION` (e.g. `MESHZIP_SNAP_FRACTION=1e-7 cargo build`)
///  2) **Runtime**: call [`set_snap_fraction`] once before using the library
static SNAP_FRACTION_CELL: OnceLock<Real> = OnceLock::new();

#[inline]
const fn default_snap_fraction() -> Real {
    #[cfg(feature = "f32")]
    {
        1e-4
    }
    #[cfg(feature = "f64")]
    {
        1e-6
    }
}

/// Returns the current snap fraction.
/// If not set yet, it tries `MESHZIP_SNAP_FRACTION` (parsed as the active `Real`)
/// and falls back to the precision default.
pub fn snap_fraction() -> Real {
    *SNAP_FRACTION_CELL.get_or_init(|| {
        if let Some(environment_variable) = option_env!("MESHZIP_SNAP_FRACTION") {
            if let Ok(value) = Real::from_str(environment_variable) {
                return value.clamp(Real::EPSILON, 1.0);
            }
        }
        default_snap_fraction()
    })
}

/// Set the snap fraction programmatically once (subsequent calls are ignored).
/// Call near program start: `meshzip::float_types::set_snap_fraction(1e-7);`
pub fn set_snap_fraction(value: Real) {
    let _ = SNAP_FRACTION_CELL.set(value.clamp(Real::EPSILON, 1.0));
}

/// Samples taken along one edge by the redundancy and border tests.
pub const DEFAULT_SAMPLES_PER_EDGE: usize = 100;

/// Iteration cap for a single face walk.
pub const DEFAULT_MAX_WALK_STEPS: usize = 150;

/// Retries of the polygon triangulator after rescaling its input.
pub const DEFAULT_MAX_RESCALE_ATTEMPTS: usize = 8;

/// Scale applied to a degenerate outline before each triangulation retry.
pub const RESCALE_FACTOR: Real = 10.0;
