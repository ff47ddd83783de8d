//! # despike
//!
//! Spike removal for digitized polyline networks.
//!
//! This library provides:
//! - Interior angle measurement at polyline vertices
//! - Spike detection against a caller-supplied angle threshold
//! - Exclusion zones built from buffered spike vertices
//! - A correction pipeline that subtracts those zones from the merged lines
//! - GeoJSON and GPX collaborators for reading sources and writing results
//!
//! ## Features
//!
//! - **`parallel`** - Run independent corrections in parallel with rayon
//! - **`synthetic`** - Seeded generator of spiky test polylines
//! - **`cli`** - Build the `despike-cli` binary (enabled by default)
//!
//! ## Quick Start
//!
//! ```rust
//! use despike::{correct, Point2D, Polyline};
//!
//! // An L-shaped line with a 90 degree corner at (5, 0)
//! let line = Polyline::single(vec![
//!     Point2D::new(0.0, 0.0),
//!     Point2D::new(5.0, 0.0),
//!     Point2D::new(5.0, 5.0),
//! ])
//! .unwrap();
//!
//! let result = correct(&[line], 100.0, 1.5).unwrap();
//! assert_eq!(result.stats.spike_count, 1);
//! assert!(!result.fragments.is_empty());
//! ```

use geo::{Coord, LineString, MultiLineString};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{CorrectionError, OptionExt, Result};

// Vector math and angle measurement
pub mod geometry;
pub use geometry::angle_at_vertex;

// Threshold-based spike detection
pub mod detect;
pub use detect::{find_spikes, find_spikes_in_part, DegeneratePolicy, SpikeScan, SpikeVertex};

// Geometry kernel contract and the geo-backed implementation
pub mod kernel;
pub use kernel::{Area, GeoKernel, GeometryKernel};

// Disjoint-set grouping used by the kernel's area union
pub mod union_find;
pub use union_find::UnionFind;

// Exclusion zones around spike vertices
pub mod zone;
pub use zone::{build_exclusion_zone, ExclusionZone};

// Multipart decomposition
pub mod split;
pub use split::explode_multipart;

// Stage hooks for progress reporting and cancellation
pub mod progress;
pub use progress::{
    AtomicProgressTracker, CorrectionObserver, CorrectionStage, NoopObserver, StageControl,
};

// Correction pipeline
pub mod corrector;
#[cfg(feature = "parallel")]
pub use corrector::correct_batch;
pub use corrector::{correct, Corrector};

// Source and output collaborators
pub mod io;

// Synthetic polylines for benchmarks and stress tests
#[cfg(feature = "synthetic")]
pub mod synthetic;

// ============================================================================
// Core Types
// ============================================================================

/// A planar coordinate in map units.
///
/// # Example
/// ```
/// use despike::Point2D;
/// let p = Point2D::new(5.0, 0.0);
/// assert_eq!(p.x, 5.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    /// Create a new point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Check if both coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<Coord<f64>> for Point2D {
    fn from(c: Coord<f64>) -> Self {
        Self { x: c.x, y: c.y }
    }
}

impl From<Point2D> for Coord<f64> {
    fn from(p: Point2D) -> Self {
        Coord { x: p.x, y: p.y }
    }
}

/// An ordered set of vertex chains sharing one logical record.
///
/// Every part holds at least two points. A single-part polyline has exactly
/// one part; a multipart polyline holds several disconnected chains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    parts: Vec<Vec<Point2D>>,
}

impl Polyline {
    /// Create a polyline from parts.
    ///
    /// Returns `None` if there are no parts or any part has fewer than 2 points.
    pub fn new(parts: Vec<Vec<Point2D>>) -> Option<Self> {
        if parts.is_empty() || parts.iter().any(|p| p.len() < 2) {
            return None;
        }
        Some(Self { parts })
    }

    /// Create a single-part polyline.
    pub fn single(points: Vec<Point2D>) -> Option<Self> {
        Self::new(vec![points])
    }

    /// Create a polyline from parts, dropping parts with fewer than 2 points.
    ///
    /// Returns `None` if nothing survives.
    pub fn from_parts_lossy(parts: Vec<Vec<Point2D>>) -> Option<Self> {
        let parts: Vec<Vec<Point2D>> = parts.into_iter().filter(|p| p.len() >= 2).collect();
        Self::new(parts)
    }

    pub fn parts(&self) -> &[Vec<Point2D>] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<Vec<Point2D>> {
        self.parts
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn is_multipart(&self) -> bool {
        self.parts.len() > 1
    }

    /// Total number of vertices across all parts.
    pub fn point_count(&self) -> usize {
        self.parts.iter().map(Vec::len).sum()
    }

    /// All vertices across parts, in part order.
    pub fn points(&self) -> impl Iterator<Item = &Point2D> + '_ {
        self.parts.iter().flatten()
    }

    /// Check every vertex has finite coordinates.
    pub fn is_finite(&self) -> bool {
        self.points().all(Point2D::is_finite)
    }

    /// Sum of segment lengths across all parts.
    pub fn length(&self) -> f64 {
        self.parts.iter().map(|p| part_length(p)).sum()
    }

    /// Convert to a geo `MultiLineString`, one `LineString` per part.
    pub fn to_multi_line_string(&self) -> MultiLineString<f64> {
        MultiLineString::new(
            self.parts
                .iter()
                .map(|part| LineString::new(part.iter().map(|&p| p.into()).collect()))
                .collect(),
        )
    }

    /// Build from a geo `MultiLineString`, dropping parts with fewer than 2 points.
    pub fn from_multi_line_string(mls: &MultiLineString<f64>) -> Option<Self> {
        Self::from_parts_lossy(
            mls.0
                .iter()
                .map(|ls| ls.0.iter().map(|&c| c.into()).collect())
                .collect(),
        )
    }

    /// Build a single-part polyline from a geo `LineString`.
    pub fn from_line_string(ls: &LineString<f64>) -> Option<Self> {
        Self::single(ls.0.iter().map(|&c| c.into()).collect())
    }
}

/// Length of one vertex chain.
pub(crate) fn part_length(points: &[Point2D]) -> f64 {
    points
        .windows(2)
        .map(|w| geometry::distance(w[0], w[1]))
        .sum()
}

/// Interior angle threshold in degrees, within (0, 180].
///
/// Vertices whose interior angle is at or below the threshold are spikes.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct AngleThreshold(f64);

impl AngleThreshold {
    /// Validate and wrap a threshold in degrees.
    pub fn new(degrees: f64) -> Result<Self> {
        if degrees.is_finite() && degrees > 0.0 && degrees <= 180.0 {
            Ok(Self(degrees))
        } else {
            Err(CorrectionError::InvalidThreshold(degrees))
        }
    }

    pub fn degrees(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for AngleThreshold {
    type Error = CorrectionError;

    fn try_from(degrees: f64) -> Result<Self> {
        Self::new(degrees)
    }
}

impl From<AngleThreshold> for f64 {
    fn from(t: AngleThreshold) -> Self {
        t.0
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the correction pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CorrectionConfig {
    /// Interior angle (degrees) at or below which a vertex is a spike.
    /// Default: 30.0
    pub angle_threshold: f64,

    /// Radius of the exclusion buffer around each spike, in map units.
    /// Default: 1.5
    pub buffer_radius: f64,

    /// Number of polygon vertices used to approximate a circular buffer.
    /// Default: 32
    pub circle_segments: u32,

    /// What to do with a vertex adjacent to a zero-length edge or with a
    /// non-finite coordinate.
    /// Default: skip the vertex
    pub degenerate_policy: DegeneratePolicy,

    /// Fragments shorter than this after differencing are dropped.
    /// Default: 0.0 (keep every non-empty fragment)
    pub min_fragment_length: f64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            angle_threshold: 30.0,
            buffer_radius: 1.5,
            circle_segments: kernel::DEFAULT_CIRCLE_SEGMENTS,
            degenerate_policy: DegeneratePolicy::Skip,
            min_fragment_length: 0.0,
        }
    }
}

impl CorrectionConfig {
    /// Check every parameter is within its valid range.
    pub fn validate(&self) -> Result<()> {
        AngleThreshold::new(self.angle_threshold)?;
        if !self.buffer_radius.is_finite() || self.buffer_radius <= 0.0 {
            return Err(CorrectionError::InvalidBufferRadius(self.buffer_radius));
        }
        if !(3..=kernel::MAX_CIRCLE_SEGMENTS).contains(&self.circle_segments) {
            return Err(CorrectionError::InvalidInput(format!(
                "circle_segments must be between 3 and {}, got {}",
                kernel::MAX_CIRCLE_SEGMENTS,
                self.circle_segments
            )));
        }
        if !self.min_fragment_length.is_finite() || self.min_fragment_length < 0.0 {
            return Err(CorrectionError::InvalidInput(format!(
                "min_fragment_length must be a non-negative number, got {}",
                self.min_fragment_length
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Results
// ============================================================================

/// Stage counters for one correction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionStats {
    /// Number of polylines handed to the pipeline
    pub input_lines: usize,
    /// Vertices flagged as spikes
    pub spike_count: usize,
    /// Buffers that were successfully built around spikes
    pub buffer_count: usize,
    /// Single-part fragments after exploding the merged geometry
    pub fragment_count: usize,
    /// Fragments surviving the difference step
    pub final_count: usize,
    /// Vertices skipped because an adjacent edge had zero length
    pub skipped_degenerate: usize,
}

/// Output of a correction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionResult {
    /// Cleaned fragments, each non-empty with non-zero length
    pub fragments: Vec<Polyline>,
    /// Flagged vertices, in detection order
    pub spikes: Vec<SpikeVertex>,
    pub stats: CorrectionStats,
}

impl CorrectionResult {
    /// True when no exclusion zone was applied.
    pub fn is_pass_through(&self) -> bool {
        self.stats.buffer_count == 0
    }

    /// Total length of all fragments.
    pub fn total_length(&self) -> f64 {
        self.fragments.iter().map(Polyline::length).sum()
    }
}
