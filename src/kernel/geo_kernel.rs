//! [`GeometryKernel`] backed by the `geo` crate.

use std::f64::consts::PI;

use geo::{BooleanOps, BoundingRect, Coord, Intersects, LineString, MultiPolygon, Polygon, Rect};
use log::debug;
use rstar::{RTree, RTreeObject, AABB};

use super::{merge_lines, Area, GeometryKernel};
use crate::union_find::UnionFind;
use crate::{part_length, Point2D, Polyline};

/// Default number of vertices of a circular buffer.
pub const DEFAULT_CIRCLE_SEGMENTS: u32 = 32;

/// Upper bound on the number of vertices of a circular buffer.
pub const MAX_CIRCLE_SEGMENTS: u32 = 4096;

/// Geometry kernel using `geo` boolean operations and clipping.
///
/// Buffers are regular polygons circumscribing the requested circle, so the
/// removed gap around a point is never narrower than the radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoKernel {
    circle_segments: u32,
}

impl Default for GeoKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoKernel {
    pub fn new() -> Self {
        Self {
            circle_segments: DEFAULT_CIRCLE_SEGMENTS,
        }
    }

    /// Kernel approximating circles with `segments` vertices, clamped to
    /// `3..=MAX_CIRCLE_SEGMENTS`.
    pub fn with_circle_segments(segments: u32) -> Self {
        Self {
            circle_segments: segments.clamp(3, MAX_CIRCLE_SEGMENTS),
        }
    }

    pub fn circle_segments(&self) -> u32 {
        self.circle_segments
    }
}

/// Area envelope wrapper for R-tree overlap queries.
struct AreaEnvelope {
    idx: usize,
    rect: Rect<f64>,
}

impl RTreeObject for AreaEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.rect.min().x, self.rect.min().y],
            [self.rect.max().x, self.rect.max().y],
        )
    }
}

impl GeometryKernel for GeoKernel {
    fn union_lines(&self, lines: &[Polyline]) -> Option<Polyline> {
        merge_lines(lines)
    }

    fn buffer_point(&self, point: Point2D, radius: f64) -> Option<Area> {
        if !point.is_finite() || !radius.is_finite() || radius <= 0.0 {
            return None;
        }

        let n = self.circle_segments;
        let circumradius = radius / (PI / n as f64).cos();
        let mut ring: Vec<Coord<f64>> = (0..n)
            .map(|i| {
                let theta = 2.0 * PI * i as f64 / n as f64;
                Coord {
                    x: point.x + circumradius * theta.cos(),
                    y: point.y + circumradius * theta.sin(),
                }
            })
            .collect();
        ring.push(ring[0]);

        let polygon = Polygon::new(LineString::new(ring), Vec::new());
        Some(Area::new(MultiPolygon::new(vec![polygon])))
    }

    fn union_areas(&self, areas: Vec<Area>) -> Option<Area> {
        let areas: Vec<(MultiPolygon<f64>, Rect<f64>)> = areas
            .into_iter()
            .filter(|a| !a.is_empty())
            .filter_map(|a| {
                let rect = a.bounding_rect()?;
                Some((a.into_multi_polygon(), rect))
            })
            .collect();
        if areas.is_empty() {
            return None;
        }

        // Only areas with overlapping envelopes can touch; everything else is
        // already disjoint and can be concatenated as-is.
        let tree = RTree::bulk_load(
            areas
                .iter()
                .enumerate()
                .map(|(idx, (_, rect))| AreaEnvelope { idx, rect: *rect })
                .collect(),
        );
        let mut uf = UnionFind::with_capacity(areas.len());
        for idx in 0..areas.len() {
            uf.make_set(idx);
        }
        for (idx, (_, rect)) in areas.iter().enumerate() {
            let query = AreaEnvelope { idx, rect: *rect }.envelope();
            for other in tree.locate_in_envelope_intersecting(&query) {
                if other.idx != idx {
                    uf.union(&idx, &other.idx);
                }
            }
        }

        let clusters = uf.groups();
        debug!(
            "[GeoKernel] Unioning {} areas in {} clusters",
            areas.len(),
            clusters.len()
        );

        let mut polygons = Vec::new();
        for cluster in clusters {
            let mut members = cluster.into_iter().map(|i| &areas[i].0);
            let first = match members.next() {
                Some(first) => first.clone(),
                None => continue,
            };
            let merged = members.fold(first, |acc, next| acc.union(next));
            polygons.extend(merged.0);
        }

        let merged = Area::new(MultiPolygon::new(polygons));
        if merged.is_empty() {
            None
        } else {
            Some(merged)
        }
    }

    fn difference(&self, line: &Polyline, area: &Area) -> Option<Polyline> {
        if area.is_empty() || !envelopes_intersect(line, area) {
            return Some(line.clone());
        }
        // geo clipping cannot place non-finite coordinates
        if !line.is_finite() {
            debug!("[GeoKernel] Non-finite line left unclipped");
            return Some(line.clone());
        }

        let clipped = area
            .as_multi_polygon()
            .clip(&line.to_multi_line_string(), true);

        let parts: Vec<Vec<Point2D>> = clipped
            .0
            .iter()
            .map(|ls| dedup_consecutive(ls.0.iter().map(|&c| c.into())))
            .filter(|part| part_length(part) > 0.0)
            .collect();

        Polyline::from_parts_lossy(parts)
    }

    fn explode(&self, line: &Polyline) -> Vec<Polyline> {
        line.parts()
            .iter()
            .filter_map(|part| Polyline::single(part.clone()))
            .collect()
    }
}

fn envelopes_intersect(line: &Polyline, area: &Area) -> bool {
    match (line.to_multi_line_string().bounding_rect(), area.bounding_rect()) {
        (Some(l), Some(a)) => l.intersects(&a),
        _ => false,
    }
}

/// Drop consecutive repeated coordinates left behind by clipping.
fn dedup_consecutive(points: impl Iterator<Item = Point2D>) -> Vec<Point2D> {
    let mut out: Vec<Point2D> = Vec::new();
    for p in points {
        if out.last() != Some(&p) {
            out.push(p);
        }
    }
    out
}
