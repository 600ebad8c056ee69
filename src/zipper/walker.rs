//! Projection of the patch border onto the base mesh.
//!
//! Every border edge of the patch is resolved against the base faces under it. The
//! walker only reads the merged mesh: new vertices, snapped patch vertices, base face
//! cut records and patch fans are buffered in a [`WalkOutcome`] that the stitcher
//! applies afterwards.

use super::ZipperParams;
use super::aux_record::{Anchor, AuxRecord};
use super::grid::FaceGrid;
use super::probe::{Probe, Surface};
use super::projection::{
    TangentFrame, closest_on_segment, closest_on_triangle, distance_to_segment, sample_segment,
    segment_intersection_2d,
};
use crate::float_types::Real;
use crate::mesh::TriMesh;
use hashbrown::{HashMap, HashSet};
use nalgebra::Point3;
use tracing::{debug, info, trace, warn};

/// Crossing parameters at or below this are the walk's own starting point.
const MIN_EXIT_PARAM: Real = 1e-9;

/// Everything the walk wants changed in the merged mesh.
#[derive(Debug, Clone, Default)]
pub struct WalkOutcome {
    /// Faces below this index belong to the base.
    pub limit: usize,
    /// Positions of new vertices, numbered after the mesh's current vertices.
    pub new_vertices: Vec<Point3<Real>>,
    /// Patch vertices snapped onto the base surface.
    pub moved: HashMap<usize, Point3<Real>>,
    /// Cut records of base faces.
    pub records: HashMap<usize, AuxRecord>,
    /// Patch faces replaced by fans.
    pub removed: Vec<usize>,
    pub fans: Vec<[usize; 3]>,
    pub edges_walked: usize,
    pub aborts: usize,
}

/// Buffered work of one border edge, committed only when the edge resolves.
#[derive(Debug, Default)]
struct EdgeWork {
    moved: HashMap<usize, Point3<Real>>,
    cuts: Vec<(usize, Anchor, Anchor)>,
    inserts: Vec<(usize, Anchor)>,
    /// Resolved sub-edges, oriented like the border edge.
    pieces: Vec<(usize, usize)>,
}

type WalkResult = Result<(), &'static str>;

fn never_blocked(_: usize) -> bool {
    false
}

/// **Border walker**
///
/// Faces `[0, limit)` of the merged mesh are the base, the rest the patch. Each patch
/// border edge `u -> w` is handled with a stack of sub-edges `(a, b)`, classified by
/// probing both ends against the base:
///
/// - both ends close to the base border and the whole edge running along it: the ends
///   snap onto the border and are inserted into the base faces
/// - one end over the base interior: walk face by face toward the other end, cutting
///   every face crossed, until the base border is reached
/// - both ends over the interior: cut one face, two adjacent faces, or two faces around
///   a shared vertex, or split the sub-edge at its midpoint
/// - neither end over the interior: leave it alone, unless its midpoint is
///
/// When the resolved pieces differ from the original edge the patch face is replaced by
/// a fan from its opposite vertex. Walks and splits are bounded by `max_walk_steps`;
/// hitting the bound drops all work of that edge and leaves a gap.
pub struct BorderWalker<'a> {
    mesh: &'a TriMesh,
    limit: usize,
    grid: FaceGrid,
    tolerance: Real,
    snap_eps: Real,
    samples: usize,
    max_steps: usize,
    out: WalkOutcome,
}

impl<'a> BorderWalker<'a> {
    pub fn new(mesh: &'a TriMesh, limit: usize, params: &ZipperParams, snap_eps: Real) -> Self {
        BorderWalker {
            mesh,
            limit,
            grid: FaceGrid::build(mesh, 0..limit),
            tolerance: params.tolerance,
            snap_eps,
            samples: params.samples_per_edge.max(1),
            max_steps: params.max_walk_steps.max(1),
            out: WalkOutcome {
                limit,
                ..Default::default()
            },
        }
    }

    /// Walk every patch border edge, one per patch face.
    pub fn run(mut self) -> WalkOutcome {
        let loops = self.mesh.border_loops();
        let mut visited: HashSet<usize> = HashSet::new();
        for border in loops {
            for (face, edge) in border {
                if face < self.limit || !visited.insert(face) {
                    continue;
                }
                self.out.edges_walked += 1;
                self.walk_edge(face, edge);
            }
        }
        info!(
            edges = self.out.edges_walked,
            new_vertices = self.out.new_vertices.len(),
            cut_faces = self.out.records.len(),
            fanned = self.out.removed.len(),
            aborts = self.out.aborts,
            "patch border walked"
        );
        self.out
    }

    fn walk_edge(&mut self, face: usize, edge: usize) {
        let f = self.mesh.faces[face];
        let (u, w) = f.edge(edge);
        let third = f.vertices[(edge + 2) % 3];

        let mut work = EdgeWork::default();
        let resolved = self.resolve(u, w, &mut work).and_then(|()| assemble(u, w, &work.pieces));
        match resolved {
            Ok(chain) => self.commit(face, third, chain, work),
            Err(reason) => {
                self.out.aborts += 1;
                warn!(face, u, w, reason, "border edge left unstitched");
            },
        }
    }

    fn resolve(&mut self, u: usize, w: usize, work: &mut EdgeWork) -> WalkResult {
        let mut stack = vec![(u, w)];
        let mut budget = 2 * self.max_steps;
        while let Some((a, b)) = stack.pop() {
            if budget == 0 {
                return Err("sub-edge budget exhausted");
            }
            budget -= 1;

            let qa = self.probe(&self.pos(a, work));
            let qb = self.probe(&self.pos(b, work));
            match (qa.is_good(), qb.is_good()) {
                (true, true) => self.both_good(a, b, &qa, &qb, work, &mut stack),
                (true, false) => self.walk_across(a, b, &qa, true, work)?,
                (false, true) => self.walk_across(b, a, &qb, false, work)?,
                (false, false) => self.both_bad(a, b, &qa, &qb, work, &mut stack),
            }
        }
        Ok(())
    }

    /// Neither end lies over the base interior.
    fn both_bad(
        &mut self,
        a: usize,
        b: usize,
        qa: &Probe,
        qb: &Probe,
        work: &mut EdgeWork,
        stack: &mut Vec<(usize, usize)>,
    ) {
        let (pa, pb) = (self.pos(a, work), self.pos(b, work));
        if qa.hit.is_none() && qb.hit.is_none() {
            trace!(a, b, "sub-edge away from the base");
            work.pieces.push((a, b));
            return;
        }

        if qa.on_border && qb.on_border && self.runs_along_border(&pa, &pb) {
            debug!(a, b, "sub-edge along the base border");
            for (v, q) in [(a, qa), (b, qb)] {
                let anchor = self.snap(v, q, work);
                if let (None, Some(f)) = (q.corner, q.face()) {
                    work.inserts.push((f, anchor));
                }
            }
            work.pieces.push((a, b));
            return;
        }

        let mid = nalgebra::center(&pa, &pb);
        if (pb - pa).norm() > 2.0 * self.snap_eps && self.probe(&mid).is_good() {
            let m = self.new_vertex(mid);
            stack.push((m, b));
            stack.push((a, m));
        } else {
            trace!(a, b, "sub-edge left as is");
            work.pieces.push((a, b));
        }
    }

    /// Both ends lie over the base interior.
    fn both_good(
        &mut self,
        a: usize,
        b: usize,
        qa: &Probe,
        qb: &Probe,
        work: &mut EdgeWork,
        stack: &mut Vec<(usize, usize)>,
    ) {
        let (Some(fa), Some(fb)) = (qa.face(), qb.face()) else {
            work.pieces.push((a, b));
            return;
        };
        let ea = self.snap(a, qa, work);
        let eb = self.snap(b, qb, work);
        if ea.0 == eb.0 {
            work.pieces.push((a, b));
            return;
        }

        // one face holds both ends
        if let Some(f) = [fa, fb]
            .into_iter()
            .find(|&f| self.lies_on(f, &ea) && self.lies_on(f, &eb))
        {
            work.cuts.push((f, ea, eb));
            work.pieces.push((a, b));
            return;
        }

        // adjacent faces
        if let Some(e) = (0..3).find(|&e| self.mesh.faces[fa].neighbors[e] == fb) {
            let tri = self.mesh.triangle(fa);
            let x = self.crossing_point(&ea.1, &eb.1, &tri[e], &tri[(e + 1) % 3]);
            if (x - ea.1).norm() <= self.snap_eps {
                work.cuts.push((fb, ea, eb));
                work.inserts.push((fa, ea));
                work.pieces.push((a, b));
            } else if (x - eb.1).norm() <= self.snap_eps {
                work.cuts.push((fa, ea, eb));
                work.inserts.push((fb, eb));
                work.pieces.push((a, b));
            } else {
                let ex = self.edge_anchor(fa, e, x);
                work.cuts.push((fa, ea, ex));
                work.cuts.push((fb, ex, eb));
                work.pieces.push((a, ex.0));
                work.pieces.push((ex.0, b));
            }
            return;
        }

        // faces around a shared vertex the edge passes close to
        let shared = self.mesh.faces[fa]
            .vertices
            .into_iter()
            .find(|v| self.mesh.faces[fb].vertices.contains(v));
        if let Some(v) = shared {
            let pv = self.mesh.position(v);
            if distance_to_segment(&ea.1, &eb.1, &pv) <= self.tolerance {
                let ev = (v, pv);
                work.cuts.push((fa, ea, ev));
                work.cuts.push((fb, ev, eb));
                work.pieces.push((a, v));
                work.pieces.push((v, b));
                return;
            }
        }

        if (eb.1 - ea.1).norm() > 2.0 * self.snap_eps {
            let m = self.new_vertex(nalgebra::center(&ea.1, &eb.1));
            stack.push((m, b));
            stack.push((a, m));
        } else {
            work.pieces.push((a, b));
        }
    }

    /// Walk from the good end `g` toward the bad end `d`, cutting every base face on
    /// the way. `forward` tells whether `g` is the start of the sub-edge.
    fn walk_across(
        &mut self,
        g: usize,
        d: usize,
        qg: &Probe,
        forward: bool,
        work: &mut EdgeWork,
    ) -> WalkResult {
        let Some(hit) = qg.hit else {
            return Err("good end lost its probe");
        };
        let start = self.snap(g, qg, work);
        let target = self.pos(d, work);

        let mut face = hit.face;
        let mut entry: Option<usize> = None;
        let mut prev = start;
        let mut trail = vec![g];

        for _ in 0..self.max_steps {
            let tri = self.mesh.triangle(face);
            let Some(frame) = TangentFrame::of_triangle(&tri) else {
                return Err("walk entered a degenerate base face");
            };
            let (p0, p1) = (frame.project(&prev.1), frame.project(&target));
            let flat = tri.map(|p| frame.project(&p));

            let exit = (0..3)
                .filter(|&e| Some(e) != entry)
                .filter_map(|e| {
                    segment_intersection_2d(&p0, &p1, &flat[e], &flat[(e + 1) % 3]).map(|(s, _)| (e, s))
                })
                .filter(|&(_, s)| s > MIN_EXIT_PARAM)
                .max_by(|x, y| x.1.total_cmp(&y.1));

            let Some((e, _)) = exit else {
                // the bad end sits on the border of this very face
                let qd = self.probe(&target);
                if qd.on_border && qd.face() == Some(face) {
                    let end = self.snap(d, &qd, work);
                    push_cut(work, face, prev, end, forward);
                    trail.push(d);
                    return self.finish_walk(trail, forward, work);
                }
                return Err("walk left the base surface");
            };

            let x = self.crossing_point(&prev.1, &target, &tri[e], &tri[(e + 1) % 3]);
            let ex = self.edge_anchor(face, e, x);
            push_cut(work, face, prev, ex, forward);
            trail.push(ex.0);

            let next = self.mesh.faces[face].neighbors[e];
            if next == face {
                trace!(face, "walk reached the base border");
                trail.push(d);
                return self.finish_walk(trail, forward, work);
            }
            entry = Some(self.mesh.faces[face].neighbor_edges[e]);
            face = next;
            prev = ex;
        }
        Err("face walk exceeded its step limit")
    }

    fn finish_walk(&self, mut trail: Vec<usize>, forward: bool, work: &mut EdgeWork) -> WalkResult {
        if !forward {
            trail.reverse();
        }
        work.pieces
            .extend(trail.windows(2).filter(|p| p[0] != p[1]).map(|p| (p[0], p[1])));
        Ok(())
    }

    /// Apply the buffered work of a resolved edge.
    fn commit(&mut self, face: usize, third: usize, chain: Vec<usize>, work: EdgeWork) {
        let EdgeWork {
            moved,
            cuts,
            inserts,
            ..
        } = work;
        self.out.moved.extend(moved);
        for (f, a, b) in cuts {
            if let Some(record) = self.record(f) {
                record.add_cut(a, b);
            }
        }
        for (f, v) in inserts {
            if let Some(record) = self.record(f) {
                record.add_vertex(v.0, v.1);
            }
        }

        if chain.len() > 2 {
            debug!(face, pieces = chain.len() - 1, "patch face fanned over split border edge");
            self.out.removed.push(face);
            self.out
                .fans
                .extend(chain.windows(2).map(|p| [p[0], p[1], third]));
        }
    }

    fn record(&mut self, f: usize) -> Option<&mut AuxRecord> {
        if !self.out.records.contains_key(&f) {
            let face = self.mesh.faces[f];
            let record = AuxRecord::new(
                f,
                face.vertices,
                self.mesh.triangle(f),
                self.snap_eps,
                self.tolerance,
            );
            match record {
                Some(record) => {
                    self.out.records.insert(f, record);
                },
                None => {
                    debug!(face = f, "degenerate base face has no cut record");
                    return None;
                },
            }
        }
        self.out.records.get_mut(&f)
    }

    fn probe(&self, p: &Point3<Real>) -> Probe {
        Surface {
            mesh: self.mesh,
            index: &self.grid,
            radius: self.tolerance,
            snap_eps: self.snap_eps,
            blocked: &never_blocked,
        }
        .probe(p)
    }

    /// Current position of `v`, including buffered moves and new vertices.
    fn pos(&self, v: usize, work: &EdgeWork) -> Point3<Real> {
        if let Some(p) = work.moved.get(&v).or_else(|| self.out.moved.get(&v)) {
            return *p;
        }
        let n = self.mesh.vertices.len();
        if v >= n {
            self.out.new_vertices[v - n]
        } else {
            self.mesh.vertices[v].pos
        }
    }

    fn new_vertex(&mut self, p: Point3<Real>) -> usize {
        self.out.new_vertices.push(p);
        self.mesh.vertices.len() + self.out.new_vertices.len() - 1
    }

    /// Move `v` onto its probe hit and return the anchor cuts should use: the base
    /// corner when the hit snapped to one, `v` otherwise.
    ///
    /// A hit on an interior base edge is inserted into the face across that edge.
    fn snap(&self, v: usize, q: &Probe, work: &mut EdgeWork) -> Anchor {
        let Some(hit) = q.hit else {
            return (v, self.pos(v, work));
        };
        work.moved.insert(v, hit.point);
        if let Some(k) = q.corner {
            return (self.mesh.faces[hit.face].vertices[k], hit.point);
        }

        let face = self.mesh.faces[hit.face];
        let tri = self.mesh.triangle(hit.face);
        for e in 0..3 {
            let n = face.neighbors[e];
            if n != hit.face && distance_to_segment(&tri[e], &tri[(e + 1) % 3], &hit.point) <= self.snap_eps {
                work.inserts.push((n, (v, hit.point)));
            }
        }
        (v, hit.point)
    }

    /// Whether an anchor lies on base face `f`.
    fn lies_on(&self, f: usize, anchor: &Anchor) -> bool {
        if self.mesh.faces[f].corner_of(anchor.0).is_some() {
            return true;
        }
        let tri = self.mesh.triangle(f);
        (closest_on_triangle(&tri, &anchor.1) - anchor.1).norm() <= self.snap_eps
    }

    fn runs_along_border(&self, pa: &Point3<Real>, pb: &Point3<Real>) -> bool {
        sample_segment(*pa, *pb, self.samples).all(|p| {
            let q = self.probe(&p);
            q.hit.is_some() && q.on_border
        })
    }

    /// Where the segment `s0 s1` crosses the edge `p q`: the sample of the segment
    /// closest to the edge, pulled onto the edge.
    fn crossing_point(
        &self,
        s0: &Point3<Real>,
        s1: &Point3<Real>,
        p: &Point3<Real>,
        q: &Point3<Real>,
    ) -> Point3<Real> {
        let best = sample_segment(*s0, *s1, self.samples)
            .map(|x| (distance_to_segment(p, q, &x), x))
            .fold((Real::MAX, *s0), |best, cur| if cur.0 < best.0 { cur } else { best });
        closest_on_segment(p, q, &best.1)
    }

    /// Anchor for a point on edge `e` of base face `f`: an edge endpoint when within
    /// the snap distance, a new vertex otherwise.
    fn edge_anchor(&mut self, f: usize, e: usize, x: Point3<Real>) -> Anchor {
        let face = self.mesh.faces[f];
        for v in [face.vertices[e], face.vertices[(e + 1) % 3]] {
            let pv = self.mesh.position(v);
            if (pv - x).norm() <= self.snap_eps {
                return (v, pv);
            }
        }
        (self.new_vertex(x), x)
    }
}

fn push_cut(work: &mut EdgeWork, face: usize, from: Anchor, to: Anchor, forward: bool) {
    if forward {
        work.cuts.push((face, from, to));
    } else {
        work.cuts.push((face, to, from));
    }
}

/// Chain the resolved pieces from `u` to `w`.
fn assemble(u: usize, w: usize, pieces: &[(usize, usize)]) -> Result<Vec<usize>, &'static str> {
    let next: HashMap<usize, usize> = pieces.iter().copied().collect();
    if next.len() != pieces.len() {
        return Err("resolved pieces branch");
    }
    let mut chain = vec![u];
    let mut cur = u;
    while cur != w {
        let Some(&n) = next.get(&cur) else {
            return Err("resolved pieces do not reach the edge end");
        };
        chain.push(n);
        cur = n;
        if chain.len() > pieces.len() + 1 {
            return Err("resolved pieces loop");
        }
    }
    Ok(chain)
}
