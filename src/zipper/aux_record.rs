//! Per-face cut bookkeeping.
//!
//! A base face crossed by the patch border collects the pieces of that border as
//! open chains. Once every border edge has been walked, [`AuxRecord::finish`] splits
//! the face outline along each chain: the region left of a chain lies under the patch
//! and is discarded, the region right of it is kept and later retriangulated.

use super::projection::{TangentFrame, distance_to_segment, segment_intersection_2d};
use crate::float_types::Real;
use crate::float_types::parry3d::shape::Segment;
use nalgebra::{Point2, Point3};
use tracing::debug;

/// Mesh vertex index and position.
pub type Anchor = (usize, Point3<Real>);

/// Upper bound on crossing splits per face.
const MAX_CROSSING_SPLITS: usize = 64;

/// Chain parameters this close to 0 or 1 count as touching at a chain vertex.
const PARAM_EPS: Real = 1e-9;

/// An ordered chain of mesh vertices, open or closed.
#[derive(Debug, Clone, Default)]
pub struct Polyline {
    pub ids: Vec<usize>,
    pub points: Vec<Point3<Real>>,
    pub closed: bool,
}

impl Polyline {
    pub fn open(a: Anchor, b: Anchor) -> Self {
        Polyline {
            ids: vec![a.0, b.0],
            points: vec![a.1, b.1],
            closed: false,
        }
    }

    pub fn ring(ids: Vec<usize>, points: Vec<Point3<Real>>) -> Self {
        Polyline {
            ids,
            points,
            closed: true,
        }
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn first_id(&self) -> Option<usize> {
        self.ids.first().copied()
    }

    pub fn last_id(&self) -> Option<usize> {
        self.ids.last().copied()
    }

    pub fn segment_count(&self) -> usize {
        if self.closed {
            self.len()
        } else {
            self.len().saturating_sub(1)
        }
    }

    /// Vertex index pairs of every segment, in order.
    pub fn index_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let n = self.len();
        (0..self.segment_count()).map(move |i| (self.ids[i], self.ids[(i + 1) % n]))
    }

    /// Every segment as a 3D shape, in order.
    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        let n = self.len();
        (0..self.segment_count()).map(move |i| Segment::new(self.points[i], self.points[(i + 1) % n]))
    }

    pub fn length(&self) -> Real {
        self.segments().map(|s| s.length()).sum()
    }

    pub fn contains_pair(&self, a: usize, b: usize) -> bool {
        self.index_pairs().any(|(x, y)| (x, y) == (a, b) || (x, y) == (b, a))
    }

    fn push_back(&mut self, v: Anchor) {
        self.ids.push(v.0);
        self.points.push(v.1);
        self.close_if_looped();
    }

    fn push_front(&mut self, v: Anchor) {
        self.ids.insert(0, v.0);
        self.points.insert(0, v.1);
        self.close_if_looped();
    }

    fn insert(&mut self, at: usize, v: Anchor) {
        self.ids.insert(at, v.0);
        self.points.insert(at, v.1);
    }

    /// Split an open chain at vertex `k`; both halves keep that vertex.
    fn split_at(&mut self, k: usize) -> Polyline {
        let tail = Polyline {
            ids: self.ids[k..].to_vec(),
            points: self.points[k..].to_vec(),
            closed: false,
        };
        self.ids.truncate(k + 1);
        self.points.truncate(k + 1);
        tail
    }

    fn close_if_looped(&mut self) {
        if !self.closed && self.len() > 2 && self.first_id() == self.last_id() {
            self.ids.pop();
            self.points.pop();
            self.closed = true;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Keep,
    Discard,
}

/// Cut state of one base face.
///
/// Before [`AuxRecord::finish`] the discard list holds the face outline (with any
/// boundary vertices inserted so far) and `chains` the registered cuts. Afterwards
/// `keep` holds the outlines to retriangulate.
#[derive(Debug, Clone)]
pub struct AuxRecord {
    pub face: usize,
    pub frame: TangentFrame,
    triangle: [Point3<Real>; 3],
    eps: Real,
    reach: Real,
    pub keep: Vec<Polyline>,
    pub discard: Vec<Polyline>,
    pub chains: Vec<Polyline>,
    cuts_applied: usize,
}

impl AuxRecord {
    /// Record for `face` with corner indices `corners` at `triangle`.
    ///
    /// `eps` is the snap distance, `reach` the largest distance at which a chain end
    /// is still attached to the outline. Returns `None` for a degenerate face.
    pub fn new(
        face: usize,
        corners: [usize; 3],
        triangle: [Point3<Real>; 3],
        eps: Real,
        reach: Real,
    ) -> Option<Self> {
        let frame = TangentFrame::of_triangle(&triangle)?;
        Some(AuxRecord {
            face,
            frame,
            triangle,
            eps,
            reach: reach.max(eps),
            keep: Vec::new(),
            discard: vec![Polyline::ring(corners.to_vec(), triangle.to_vec())],
            chains: Vec::new(),
            cuts_applied: 0,
        })
    }

    /// Number of chains that split a component in [`AuxRecord::finish`].
    pub const fn cuts_applied(&self) -> usize {
        self.cuts_applied
    }

    /// Whether the face outline differs from the original triangle.
    pub fn is_modified(&self) -> bool {
        if self.cuts_applied > 0 {
            return true;
        }
        let rings = self.keep.iter().chain(&self.discard);
        rings.map(Polyline::len).sum::<usize>() > 3 || self.keep.len() + self.discard.len() != 1
    }

    /// Whether mesh vertex `v` ends up only on the discarded side of the cuts.
    pub fn discards(&self, v: usize) -> bool {
        self.discard.iter().any(|r| r.ids.contains(&v)) && !self.keep.iter().any(|r| r.ids.contains(&v))
    }

    /// Insert a vertex lying on the face outline.
    ///
    /// Returns `false` when the vertex is already there, coincides with an outline
    /// vertex, or lies farther than the reach from the outline.
    pub fn add_vertex(&mut self, id: usize, pos: Point3<Real>) -> bool {
        let rings = self.discard.iter().chain(&self.keep);
        if rings.clone().any(|r| r.ids.contains(&id)) {
            return false;
        }
        if rings
            .flat_map(|r| r.points.iter())
            .any(|p| (p - pos).norm() <= self.eps)
        {
            return false;
        }

        let mut best: Option<(Side, usize, usize, Real)> = None;
        for (side, list) in [(Side::Discard, &self.discard), (Side::Keep, &self.keep)] {
            for (k, ring) in list.iter().enumerate() {
                let (edge, d) = nearest_edge(ring, &pos);
                if d <= self.reach && best.is_none_or(|b| d < b.3) {
                    best = Some((side, k, edge, d));
                }
            }
        }
        let Some((side, k, edge, _)) = best else {
            return false;
        };
        self.list_mut(side)[k].insert(edge + 1, (id, pos));
        true
    }

    /// Register the cut `a -> b`, oriented with the patch on its left.
    ///
    /// A cut running along the face outline only inserts its endpoints. Cuts sharing
    /// an endpoint are joined into one chain. Returns whether anything changed.
    pub fn add_cut(&mut self, a: Anchor, b: Anchor) -> bool {
        if a.0 == b.0 || self.chains.iter().any(|c| c.contains_pair(a.0, b.0)) {
            return false;
        }
        if self.along_outline(&a.1, &b.1) {
            let first = self.add_vertex(a.0, a.1);
            let second = self.add_vertex(b.0, b.1);
            return first || second;
        }

        if let Some(chain) = self
            .chains
            .iter_mut()
            .find(|c| !c.closed && c.last_id() == Some(a.0))
        {
            chain.push_back(b);
        } else if let Some(chain) = self
            .chains
            .iter_mut()
            .find(|c| !c.closed && c.first_id() == Some(b.0))
        {
            chain.push_front(a);
        } else {
            self.chains.push(Polyline::open(a, b));
        }
        self.join_chains();
        true
    }

    /// Split the outline along every registered chain.
    ///
    /// `new_vertex` creates a mesh vertex for chain crossings. Returns the number of
    /// chains applied. When none applies, the whole outline (with inserted boundary
    /// vertices) is kept.
    pub fn finish(&mut self, new_vertex: &mut dyn FnMut(Point3<Real>) -> usize) -> usize {
        self.split_crossings(new_vertex);
        self.split_on_outline();

        let chains = std::mem::take(&mut self.chains);
        for chain in &chains {
            if chain.closed {
                debug!(face = self.face, len = chain.len(), "closed cut chain inside one face skipped");
                continue;
            }
            if !self.apply_cut(chain) {
                debug!(
                    face = self.face,
                    start = ?chain.first_id(),
                    end = ?chain.last_id(),
                    "dangling cut chain skipped"
                );
            }
        }
        self.chains = chains;

        if self.cuts_applied == 0 {
            let mut rest = std::mem::take(&mut self.discard);
            self.keep.append(&mut rest);
        }
        self.cuts_applied
    }

    /// Lengths of component segments on the original triangle outline and off it,
    /// summed over keep and discard.
    pub fn outline_split(&self) -> (Real, Real) {
        let (mut on, mut off) = (0.0, 0.0);
        for ring in self.keep.iter().chain(&self.discard) {
            for s in ring.segments() {
                if self.along_outline(&s.a, &s.b) {
                    on += s.length();
                } else {
                    off += s.length();
                }
            }
        }
        (on, off)
    }

    fn list_mut(&mut self, side: Side) -> &mut Vec<Polyline> {
        match side {
            Side::Keep => &mut self.keep,
            Side::Discard => &mut self.discard,
        }
    }

    /// Both points lie on the same edge of the original triangle.
    fn along_outline(&self, a: &Point3<Real>, b: &Point3<Real>) -> bool {
        (0..3).any(|e| {
            let (p, q) = (&self.triangle[e], &self.triangle[(e + 1) % 3]);
            distance_to_segment(p, q, a) <= self.eps && distance_to_segment(p, q, b) <= self.eps
        })
    }

    fn on_outline(&self, p: &Point3<Real>) -> bool {
        (0..3).any(|e| {
            distance_to_segment(&self.triangle[e], &self.triangle[(e + 1) % 3], p) <= self.eps
        })
    }

    fn join_chains(&mut self) {
        loop {
            let n = self.chains.len();
            let pair = (0..n)
                .flat_map(|i| (0..n).map(move |j| (i, j)))
                .find(|&(i, j)| {
                    i != j
                        && !self.chains[i].closed
                        && !self.chains[j].closed
                        && self.chains[i].last_id() == self.chains[j].first_id()
                });
            let Some((i, j)) = pair else {
                return;
            };
            let tail = self.chains.remove(j);
            let head = &mut self.chains[if j < i { i - 1 } else { i }];
            head.ids.extend_from_slice(&tail.ids[1..]);
            head.points.extend_from_slice(&tail.points[1..]);
            head.close_if_looped();
        }
    }

    /// Make chains that cross each other meet at a shared vertex, splitting the later
    /// chain there so each piece runs between two outline points.
    fn split_crossings(&mut self, new_vertex: &mut dyn FnMut(Point3<Real>) -> usize) {
        for _ in 0..MAX_CROSSING_SPLITS {
            let Some((i, si, j, sj, s, t)) = self.find_crossing() else {
                return;
            };
            let n_i = self.chains[i].len();
            let n_j = self.chains[j].len();
            let (a0, a1) = (si, (si + 1) % n_i);
            let (b0, b1) = (sj, (sj + 1) % n_j);

            let x: Anchor = if t <= PARAM_EPS || t >= 1.0 - PARAM_EPS {
                let k = if t <= PARAM_EPS { b0 } else { b1 };
                (self.chains[j].ids[k], self.chains[j].points[k])
            } else if s <= PARAM_EPS || s >= 1.0 - PARAM_EPS {
                let k = if s <= PARAM_EPS { a0 } else { a1 };
                (self.chains[i].ids[k], self.chains[i].points[k])
            } else {
                let (p, q) = (self.chains[i].points[a0], self.chains[i].points[a1]);
                let pos = p + (q - p) * s;
                (new_vertex(pos), pos)
            };

            if !self.chains[i].ids.contains(&x.0) {
                self.chains[i].insert(si + 1, x);
            }
            if !self.chains[j].ids.contains(&x.0) {
                self.chains[j].insert(sj + 1, x);
            }
            if let Some(k) = self.chains[j].ids.iter().position(|&v| v == x.0) {
                if k > 0 && k + 1 < self.chains[j].len() {
                    let tail = self.chains[j].split_at(k);
                    self.chains.push(tail);
                }
            }
        }
        debug!(face = self.face, "crossing split limit reached");
    }

    fn find_crossing(&self) -> Option<(usize, usize, usize, usize, Real, Real)> {
        let flat: Vec<Vec<Point2<Real>>> = self
            .chains
            .iter()
            .map(|c| c.points.iter().map(|p| self.frame.project(p)).collect())
            .collect();

        for i in 0..self.chains.len() {
            for j in i + 1..self.chains.len() {
                let (ci, cj) = (&self.chains[i], &self.chains[j]);
                if ci.closed || cj.closed {
                    continue;
                }
                for (si, (a0, a1)) in ci.index_pairs().enumerate() {
                    for (sj, (b0, b1)) in cj.index_pairs().enumerate() {
                        if a0 == b0 || a0 == b1 || a1 == b0 || a1 == b1 {
                            continue;
                        }
                        let hit = segment_intersection_2d(
                            &flat[i][si],
                            &flat[i][si + 1],
                            &flat[j][sj],
                            &flat[j][sj + 1],
                        );
                        if let Some((s, t)) = hit {
                            let s_end = s <= PARAM_EPS || s >= 1.0 - PARAM_EPS;
                            let t_end = t <= PARAM_EPS || t >= 1.0 - PARAM_EPS;
                            if !(s_end && t_end) {
                                return Some((i, si, j, sj, s, t));
                            }
                        }
                    }
                }
            }
        }
        None
    }

    /// Split chains at interior vertices that touch the original outline.
    fn split_on_outline(&mut self) {
        let mut k = 0;
        while k < self.chains.len() {
            let chain = &self.chains[k];
            let touch = if chain.closed {
                None
            } else {
                (1..chain.len().saturating_sub(1)).find(|&v| self.on_outline(&chain.points[v]))
            };
            match touch {
                Some(v) => {
                    let tail = self.chains[k].split_at(v);
                    self.chains.push(tail);
                },
                None => k += 1,
            }
        }
    }

    /// Split the component holding both ends of `chain`.
    fn apply_cut(&mut self, chain: &Polyline) -> bool {
        let (Some(&start), Some(&end)) = (chain.points.first(), chain.points.last()) else {
            return false;
        };
        if chain.len() < 2 || chain.first_id() == chain.last_id() {
            return false;
        }
        let probe = self.frame.project(&nalgebra::center(&chain.points[0], &chain.points[1]));

        let mut best: Option<((bool, bool, Real), Side, usize)> = None;
        for (side, list) in [(Side::Keep, &self.keep), (Side::Discard, &self.discard)] {
            for (k, ring) in list.iter().enumerate() {
                let d = ring_distance(ring, chain.ids[0], &start)
                    .max(ring_distance(ring, chain.ids[chain.len() - 1], &end));
                if d > self.reach {
                    continue;
                }
                let flat: Vec<Point2<Real>> = ring.points.iter().map(|p| self.frame.project(p)).collect();
                let key = (d > self.eps, !contains_2d(&flat, &probe), d);
                if best.is_none_or(|(b, _, _)| key < b) {
                    best = Some((key, side, k));
                }
            }
        }
        let Some((_, side, k)) = best else {
            return false;
        };

        let mut ring = self.list_mut(side).remove(k);
        let s_id = self.attach(&mut ring, (chain.ids[0], start));
        let e_id = self.attach(&mut ring, (chain.ids[chain.len() - 1], end));
        let (Some(i_s), Some(i_e)) = (
            ring.ids.iter().position(|&v| v == s_id),
            ring.ids.iter().position(|&v| v == e_id),
        ) else {
            self.list_mut(side).insert(k, ring);
            return false;
        };
        if i_s == i_e {
            self.list_mut(side).insert(k, ring);
            return false;
        }

        let inner = 1..chain.len() - 1;
        let mut left = Polyline::ring(vec![s_id], vec![ring.points[i_s]]);
        for v in inner.clone() {
            left.insert(left.len(), (chain.ids[v], chain.points[v]));
        }
        left.insert(left.len(), (e_id, ring.points[i_e]));
        for v in arc(ring.len(), i_e, i_s) {
            left.insert(left.len(), (ring.ids[v], ring.points[v]));
        }

        let mut right = Polyline::ring(vec![e_id], vec![ring.points[i_e]]);
        for v in inner.rev() {
            right.insert(right.len(), (chain.ids[v], chain.points[v]));
        }
        right.insert(right.len(), (s_id, ring.points[i_s]));
        for v in arc(ring.len(), i_s, i_e) {
            right.insert(right.len(), (ring.ids[v], ring.points[v]));
        }

        if left.len() >= 3 {
            self.discard.push(left);
        }
        if right.len() >= 3 {
            self.keep.push(right);
        }
        self.cuts_applied += 1;
        true
    }

    /// Make `v` a vertex of `ring` and return the index used for it there.
    ///
    /// An outline vertex within the snap distance stands in for `v`.
    fn attach(&self, ring: &mut Polyline, v: Anchor) -> usize {
        if ring.ids.contains(&v.0) {
            return v.0;
        }
        if let Some(k) = ring.points.iter().position(|p| (p - v.1).norm() <= self.eps) {
            return ring.ids[k];
        }
        let (edge, _) = nearest_edge(ring, &v.1);
        ring.insert(edge + 1, v);
        v.0
    }
}

/// Indices strictly between `from` and `to`, walking a ring of `n` vertices forward.
fn arc(n: usize, from: usize, to: usize) -> impl Iterator<Item = usize> {
    let steps = (to + n - from) % n;
    (1..steps).map(move |k| (from + k) % n)
}

/// Closest segment of a closed ring to `p`: (segment index, distance).
fn nearest_edge(ring: &Polyline, p: &Point3<Real>) -> (usize, Real) {
    let n = ring.len();
    (0..n)
        .map(|i| (i, distance_to_segment(&ring.points[i], &ring.points[(i + 1) % n], p)))
        .fold((0, Real::MAX), |best, cur| if cur.1 < best.1 { cur } else { best })
}

fn ring_distance(ring: &Polyline, id: usize, p: &Point3<Real>) -> Real {
    if ring.ids.contains(&id) {
        0.0
    } else {
        nearest_edge(ring, p).1
    }
}

/// Even-odd point in polygon test.
fn contains_2d(ring: &[Point2<Real>], p: &Point2<Real>) -> bool {
    let n = ring.len();
    let mut inside = false;
    for i in 0..n {
        let (a, b) = (ring[i], ring[(i + 1) % n]);
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_record() -> AuxRecord {
        AuxRecord::new(
            7,
            [0, 1, 2],
            [
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            1e-9,
            1e-3,
        )
        .expect("non-degenerate")
    }

    fn sorted(ids: &[usize]) -> Vec<usize> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_single_cut_splits_corner_off() {
        let mut record = unit_record();
        assert!(record.add_cut(
            (10, Point3::new(0.5, 0.0, 0.0)),
            (11, Point3::new(0.0, 0.5, 0.0))
        ));
        let mut next = 100;
        let applied = record.finish(&mut |_| {
            next += 1;
            next
        });
        assert_eq!(applied, 1);
        assert_eq!(record.discard.len(), 1);
        assert_eq!(sorted(&record.discard[0].ids), vec![0, 10, 11]);
        assert_eq!(record.keep.len(), 1);
        assert_eq!(record.keep[0].ids, vec![11, 10, 1, 2]);
        assert!(record.discards(0));
        assert!(!record.discards(10));
        assert!(!record.discards(1));
    }

    #[test]
    fn test_components_conserve_outline_and_cuts() {
        let mut record = unit_record();
        // a bent chain through an interior patch vertex
        record.add_cut((10, Point3::new(0.2, 0.0, 0.0)), (12, Point3::new(0.3, 0.3, 0.0)));
        record.add_cut((12, Point3::new(0.3, 0.3, 0.0)), (11, Point3::new(0.0, 0.4, 0.0)));
        assert_eq!(record.chains.len(), 1);
        let chain_length = record.chains[0].length();
        record.finish(&mut |_| usize::MAX);

        let perimeter = 2.0 + Real::sqrt(2.0);
        let (on, off) = record.outline_split();
        assert!((on - perimeter).abs() < 1e-9, "outline {on} vs {perimeter}");
        assert!((off - 2.0 * chain_length).abs() < 1e-9);
    }

    #[test]
    fn test_cut_along_outline_only_inserts_vertices() {
        let mut record = unit_record();
        assert!(record.add_cut((10, Point3::new(0.2, 0.0, 0.0)), (11, Point3::new(0.6, 0.0, 0.0))));
        assert!(record.chains.is_empty());
        assert_eq!(record.discard[0].ids, vec![0, 10, 11, 1, 2]);
        assert!(!record.add_cut((10, Point3::new(0.2, 0.0, 0.0)), (10, Point3::new(0.2, 0.0, 0.0))));

        record.finish(&mut |_| usize::MAX);
        assert!(record.is_modified());
        assert_eq!(record.cuts_applied(), 0);
        assert_eq!(record.keep[0].len(), 5);
    }

    #[test]
    fn test_crossing_chains_share_a_vertex() {
        let mut record = unit_record();
        record.add_cut((10, Point3::new(0.1, 0.0, 0.0)), (11, Point3::new(0.1, 0.9, 0.0)));
        record.add_cut((12, Point3::new(0.0, 0.2, 0.0)), (13, Point3::new(0.8, 0.2, 0.0)));
        let mut created = Vec::new();
        let applied = record.finish(&mut |p| {
            created.push(p);
            50
        });
        assert_eq!(created.len(), 1);
        assert!((created[0] - Point3::new(0.1, 0.2, 0.0)).norm() < 1e-12);
        assert_eq!(applied, 3);
        let (on, _) = record.outline_split();
        assert!((on - (2.0 + Real::sqrt(2.0))).abs() < 1e-9);
    }

    #[test]
    fn test_untouched_record_is_not_modified() {
        let mut record = unit_record();
        assert!(!record.add_vertex(1, Point3::new(1.0, 0.0, 0.0)));
        record.finish(&mut |_| usize::MAX);
        assert!(!record.is_modified());
        assert_eq!(record.keep[0].ids, vec![0, 1, 2]);
    }
}
