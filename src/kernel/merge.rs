//! Line merging.
//!
//! Dissolves duplicate segments across all inputs and sews chains together
//! wherever exactly two segments meet at a shared endpoint. Collinear
//! overlaps are split at the overlap ends first, so shared stretches dissolve
//! like exact duplicates. Nodes where one or three or more segments meet end
//! a chain. Crossing segment interiors are not noded.
//!
//! Chains start at the first unvisited segment in input order and keep that
//! segment's direction, so a network already free of shared endpoints comes
//! back unchanged and in input order.

use std::collections::{HashMap, HashSet};

use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{Coord, Line};
use rstar::{RTree, RTreeObject, AABB};

use crate::geometry::{dot, sub};
use crate::{Point2D, Polyline};

/// Bit-exact node identity. `-0.0` is folded into `0.0`.
type NodeKey = (u64, u64);

fn node_key(p: Point2D) -> NodeKey {
    let norm = |v: f64| if v == 0.0 { 0.0f64 } else { v };
    (norm(p.x).to_bits(), norm(p.y).to_bits())
}

struct Segment {
    a: Point2D,
    b: Point2D,
    ka: NodeKey,
    kb: NodeKey,
}

impl Segment {
    /// The endpoint opposite `key`.
    fn other(&self, key: NodeKey) -> (Point2D, NodeKey) {
        if self.ka == key {
            (self.b, self.kb)
        } else {
            (self.a, self.ka)
        }
    }
}

/// Merge a set of polylines into one polyline.
///
/// Returns `None` if the inputs hold no segment of non-zero length.
pub fn merge_lines(lines: &[Polyline]) -> Option<Polyline> {
    let segments = unique_segments(lines);
    if segments.is_empty() {
        return None;
    }

    let mut adjacency: HashMap<NodeKey, Vec<usize>> = HashMap::new();
    for (i, seg) in segments.iter().enumerate() {
        adjacency.entry(seg.ka).or_default().push(i);
        adjacency.entry(seg.kb).or_default().push(i);
    }

    let mut visited = vec![false; segments.len()];
    let mut chains = Vec::new();

    for start in 0..segments.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let seg = &segments[start];

        let mut forward = vec![seg.a, seg.b];
        walk(seg.kb, &segments, &adjacency, &mut visited, &mut forward);

        let mut backward = Vec::new();
        walk(seg.ka, &segments, &adjacency, &mut visited, &mut backward);

        if backward.is_empty() {
            chains.push(forward);
        } else {
            backward.reverse();
            backward.extend(forward);
            chains.push(backward);
        }
    }

    Polyline::new(chains)
}

/// Extend a chain through degree-2 nodes, appending each new endpoint.
fn walk(
    mut key: NodeKey,
    segments: &[Segment],
    adjacency: &HashMap<NodeKey, Vec<usize>>,
    visited: &mut [bool],
    out: &mut Vec<Point2D>,
) {
    loop {
        let incident = match adjacency.get(&key) {
            Some(incident) if incident.len() == 2 => incident,
            _ => return,
        };
        let next = match incident.iter().copied().find(|&i| !visited[i]) {
            Some(next) => next,
            None => return,
        };
        visited[next] = true;
        let (point, next_key) = segments[next].other(key);
        out.push(point);
        key = next_key;
    }
}

/// Segment envelope for R-tree overlap queries.
struct SegmentEnvelope {
    idx: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for SegmentEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// All non-degenerate segments in input order, split at collinear overlaps,
/// with undirected duplicates removed.
fn unique_segments(lines: &[Polyline]) -> Vec<Segment> {
    let raw: Vec<Segment> = lines
        .iter()
        .flat_map(|line| line.parts())
        .flat_map(|part| part.windows(2))
        .filter_map(|w| {
            let (a, b) = (w[0], w[1]);
            let (ka, kb) = (node_key(a), node_key(b));
            (ka != kb).then_some(Segment { a, b, ka, kb })
        })
        .collect();

    let cuts = overlap_cuts(&raw);

    let mut seen: HashSet<(NodeKey, NodeKey)> = HashSet::new();
    let mut segments = Vec::new();
    for (seg, seg_cuts) in raw.iter().zip(cuts) {
        let mut points = Vec::with_capacity(seg_cuts.len() + 2);
        points.push(seg.a);
        points.extend(seg_cuts);
        points.push(seg.b);

        for w in points.windows(2) {
            let (a, b) = (w[0], w[1]);
            let (ka, kb) = (node_key(a), node_key(b));
            if ka == kb {
                continue;
            }
            let undirected = if ka < kb { (ka, kb) } else { (kb, ka) };
            if seen.insert(undirected) {
                segments.push(Segment { a, b, ka, kb });
            }
        }
    }

    segments
}

/// For each segment, the interior points where a collinear overlap with
/// another segment begins or ends, ordered from `a` to `b`.
fn overlap_cuts(segments: &[Segment]) -> Vec<Vec<Point2D>> {
    let mut cuts: Vec<Vec<Point2D>> = vec![Vec::new(); segments.len()];

    let envelopes: Vec<SegmentEnvelope> = segments
        .iter()
        .enumerate()
        .map(|(idx, seg)| SegmentEnvelope {
            idx,
            envelope: AABB::from_corners([seg.a.x, seg.a.y], [seg.b.x, seg.b.y]),
        })
        .collect();
    let tree = RTree::bulk_load(envelopes);

    for (i, seg) in segments.iter().enumerate() {
        let envelope = AABB::from_corners([seg.a.x, seg.a.y], [seg.b.x, seg.b.y]);
        for other in tree.locate_in_envelope_intersecting(&envelope) {
            let j = other.idx;
            if j <= i {
                continue;
            }
            let overlap = match line_intersection(to_line(seg), to_line(&segments[j])) {
                Some(LineIntersection::Collinear { intersection }) => intersection,
                _ => continue,
            };
            for end in [overlap.start, overlap.end] {
                let p = Point2D::from(end);
                let key = node_key(p);
                for k in [i, j] {
                    let target = &segments[k];
                    if key != target.ka && key != target.kb {
                        cuts[k].push(p);
                    }
                }
            }
        }
    }

    for (seg, seg_cuts) in segments.iter().zip(cuts.iter_mut()) {
        let dir = sub(seg.b, seg.a);
        seg_cuts.sort_by(|p, q| dot(sub(*p, seg.a), dir).total_cmp(&dot(sub(*q, seg.a), dir)));
        seg_cuts.dedup_by_key(|p| node_key(*p));
    }

    cuts
}

fn to_line(seg: &Segment) -> Line<f64> {
    Line::new(Coord::from(seg.a), Coord::from(seg.b))
}
