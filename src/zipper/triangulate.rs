//! Triangulation of kept face outlines.

use super::aux_record::{AuxRecord, Polyline};
use super::projection::{TangentFrame, orient2d};
use crate::float_types::{RESCALE_FACTOR, Real};
use crate::traits::PolygonTriangulator;
use geo::{Coord, LineString, Polygon as GeoPolygon, TriangulateEarcut};
use hashbrown::HashSet;
use nalgebra::Point2;
use tracing::{debug, warn};

/// Ear-clipping triangulator backed by `geo`'s `earcutr` support.
#[derive(Debug, Clone, Copy, Default)]
pub struct EarcutTriangulator;

impl PolygonTriangulator for EarcutTriangulator {
    fn triangulate(&self, outline: &[Point2<Real>]) -> Vec<[usize; 3]> {
        let n = outline.len();
        if n < 3 {
            return Vec::new();
        }
        let coords: Vec<Coord<Real>> = outline.iter().map(|p| Coord { x: p.x, y: p.y }).collect();
        let triangulation = GeoPolygon::new(LineString::new(coords), Vec::new()).earcut_triangles_raw();

        // the closing coordinate, when present, aliases the first one
        triangulation
            .triangle_indices
            .chunks_exact(3)
            .map(|t| [t[0] % n, t[1] % n, t[2] % n])
            .collect()
    }
}

/// Triangulate every kept outline of a finished record, as mesh vertex triples
/// wound like the record's face. `None` when an outline cannot be triangulated.
pub fn triangulate_record<T: PolygonTriangulator + ?Sized>(
    triangulator: &T,
    record: &AuxRecord,
    max_rescale_attempts: usize,
) -> Option<Vec<[usize; 3]>> {
    let mut triangles = Vec::new();
    for ring in &record.keep {
        match triangulate_ring(triangulator, ring, &record.frame, max_rescale_attempts) {
            Some(local) => triangles.extend(local),
            None => {
                warn!(face = record.face, len = ring.len(), "outline could not be triangulated");
                return None;
            },
        }
    }
    Some(triangles)
}

/// Triangulate one closed ring lying in the plane of `frame`.
///
/// The outline is retried at a larger scale when the triangulator returns nothing.
/// Vertices dropped as collinear are put back by splitting the triangle edge they lie
/// on, so the result uses every outline vertex the ring shares with its neighbors.
pub fn triangulate_ring<T: PolygonTriangulator + ?Sized>(
    triangulator: &T,
    ring: &Polyline,
    frame: &TangentFrame,
    max_rescale_attempts: usize,
) -> Option<Vec<[usize; 3]>> {
    if ring.len() < 3 {
        return Some(Vec::new());
    }
    let mut outline: Vec<Point2<Real>> = ring.points.iter().map(|p| frame.project(p)).collect();

    let mut local = Vec::new();
    for attempt in 0..=max_rescale_attempts {
        local = triangulator.triangulate(&outline);
        local.retain(|t: &[usize; 3]| t[0] != t[1] && t[1] != t[2] && t[0] != t[2]);
        if !local.is_empty() {
            break;
        }
        if attempt < max_rescale_attempts {
            debug!(attempt, len = outline.len(), "empty triangulation, rescaling outline");
            let anchor = outline[0];
            for p in outline.iter_mut() {
                *p = anchor + (*p - anchor) * RESCALE_FACTOR;
            }
        }
    }
    if local.is_empty() {
        return None;
    }

    let (lo, hi) = bounds(&outline);
    let min_area2 = Real::EPSILON * (hi - lo).norm_squared();
    local.retain(|t| orient2d(&outline[t[0]], &outline[t[1]], &outline[t[2]]).abs() > min_area2);
    reinsert_dropped(&outline, &mut local);
    for t in local.iter_mut() {
        if orient2d(&outline[t[0]], &outline[t[1]], &outline[t[2]]) < 0.0 {
            t.swap(1, 2);
        }
    }
    Some(local.into_iter().map(|t| t.map(|k| ring.ids[k])).collect())
}

/// Put back outline vertices missing from `triangles` by splitting the triangle edge
/// each one lies on.
fn reinsert_dropped(outline: &[Point2<Real>], triangles: &mut Vec<[usize; 3]>) {
    let mut used: HashSet<usize> = triangles.iter().flatten().copied().collect();
    if used.len() == outline.len() {
        return;
    }

    let (lo, hi) = bounds(outline);
    let tol = 1e-7 * (hi - lo).max().max(Real::EPSILON);

    for k in 0..outline.len() {
        if used.contains(&k) {
            continue;
        }
        let p = outline[k];
        if used.iter().any(|&u| (outline[u] - p).norm() <= tol) {
            // a duplicate of a vertex already in use
            continue;
        }
        let split = triangles.iter().enumerate().find_map(|(ti, t)| {
            (0..3).find_map(|m| {
                let (a, b) = (outline[t[m]], outline[t[(m + 1) % 3]]);
                let ab = b - a;
                let len2 = ab.norm_squared();
                if len2 == 0.0 {
                    return None;
                }
                let s = (p - a).dot(&ab) / len2;
                let off = orient2d(&a, &b, &p).abs() / len2.sqrt();
                (s > 0.0 && s < 1.0 && off <= tol).then_some((ti, m))
            })
        });
        if let Some((ti, m)) = split {
            let t = triangles[ti];
            let (a, b, c) = (t[m], t[(m + 1) % 3], t[(m + 2) % 3]);
            triangles[ti] = [a, k, c];
            triangles.push([k, b, c]);
            used.insert(k);
        } else {
            debug!(vertex = k, "dropped outline vertex lies on no triangle edge");
        }
    }
}

fn bounds(outline: &[Point2<Real>]) -> (Point2<Real>, Point2<Real>) {
    outline
        .iter()
        .fold((outline[0], outline[0]), |(lo, hi), p| (lo.inf(p), hi.sup(p)))
}
