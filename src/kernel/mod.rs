//! # Geometry Kernel
//!
//! The correction pipeline never touches polygon clipping or line noding
//! directly. It consumes the five operations of [`GeometryKernel`]:
//!
//! | Operation | Contract |
//! |-----------|----------|
//! | `union_lines` | merge possibly-overlapping lines; `None` means nothing to merge |
//! | `buffer_point` | circular area around one point; `None` fails that point only |
//! | `union_areas` | merge buffer areas; `None` when nothing remains |
//! | `difference` | line minus area; `None` means the line was fully removed |
//! | `explode` | one single-part polyline per part, in order |
//!
//! Implementations must be safe to share between threads, which the
//! `Send + Sync` bound enforces. [`GeoKernel`] is the default implementation,
//! built on the `geo` crate's boolean operations.

mod geo_kernel;
mod merge;

pub use geo_kernel::{GeoKernel, DEFAULT_CIRCLE_SEGMENTS, MAX_CIRCLE_SEGMENTS};
pub use merge::merge_lines;

use geo::{BoundingRect, Contains, MultiPolygon, Point};

use crate::{Point2D, Polyline};

/// Operations the correction pipeline requires from a geometry library.
pub trait GeometryKernel: Send + Sync {
    /// Merge all input lines into one (possibly multipart) polyline.
    fn union_lines(&self, lines: &[Polyline]) -> Option<Polyline>;

    /// Circular buffer of `radius` around `point`.
    fn buffer_point(&self, point: Point2D, radius: f64) -> Option<Area>;

    /// Union of areas into a single region.
    fn union_areas(&self, areas: Vec<Area>) -> Option<Area>;

    /// The parts of `line` lying outside `area`.
    fn difference(&self, line: &Polyline, area: &Area) -> Option<Polyline>;

    /// Split a multipart polyline into single-part polylines.
    fn explode(&self, line: &Polyline) -> Vec<Polyline>;
}

/// A planar region, possibly disconnected and with holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Area(MultiPolygon<f64>);

impl Area {
    pub fn new(polygons: MultiPolygon<f64>) -> Self {
        Self(polygons)
    }

    pub fn empty() -> Self {
        Self(MultiPolygon::new(Vec::new()))
    }

    pub fn is_empty(&self) -> bool {
        self.0 .0.iter().all(|p| p.exterior().0.len() < 4)
    }

    /// Number of disjoint polygons.
    pub fn polygon_count(&self) -> usize {
        self.0 .0.len()
    }

    /// True if `point` lies strictly inside the region.
    pub fn contains(&self, point: Point2D) -> bool {
        self.0.contains(&Point::new(point.x, point.y))
    }

    /// Unsigned area of the region.
    pub fn area(&self) -> f64 {
        use geo::Area as _;
        self.0.unsigned_area()
    }

    pub fn bounding_rect(&self) -> Option<geo::Rect<f64>> {
        self.0.bounding_rect()
    }

    pub fn as_multi_polygon(&self) -> &MultiPolygon<f64> {
        &self.0
    }

    pub fn into_multi_polygon(self) -> MultiPolygon<f64> {
        self.0
    }
}
