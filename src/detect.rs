//! Spike detection.
//!
//! Scans the interior vertices of each polyline part and flags every vertex
//! whose interior angle is at or below the threshold. Results are positional:
//! the same coordinate appearing at two indices is reported twice.

use serde::{Deserialize, Serialize};

use crate::geometry::angle_at_vertex;
use crate::{AngleThreshold, CorrectionError, Point2D, Polyline, Result};

/// Handling of vertices where the angle is undefined: next to a zero-length
/// edge, or with a non-finite coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegeneratePolicy {
    /// Leave the vertex out of the scan and count it
    #[default]
    Skip,
    /// Abort with [`CorrectionError::DegenerateGeometry`]
    Fail,
}

/// A vertex flagged as a spike.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeVertex {
    pub point: Point2D,
    /// Part index within the scanned polyline
    pub part: usize,
    /// Vertex index within the part
    pub index: usize,
    /// Interior angle in degrees
    pub angle: f64,
}

/// Output of a spike scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpikeScan {
    /// Flagged vertices in ascending (part, index) order
    pub spikes: Vec<SpikeVertex>,
    /// Vertices whose angle was undefined and skipped
    pub skipped_degenerate: usize,
}

impl SpikeScan {
    pub fn is_empty(&self) -> bool {
        self.spikes.is_empty()
    }

    /// Spike coordinates, in detection order.
    pub fn points(&self) -> Vec<Point2D> {
        self.spikes.iter().map(|s| s.point).collect()
    }
}

/// Find spikes across every part of a polyline.
///
/// Parts with fewer than 3 points have no interior vertices and contribute
/// nothing.
pub fn find_spikes(
    polyline: &Polyline,
    threshold: AngleThreshold,
    policy: DegeneratePolicy,
) -> Result<SpikeScan> {
    let mut scan = SpikeScan::default();

    for (part_idx, part) in polyline.parts().iter().enumerate() {
        for (index, prev, vertex, next) in interior_vertices(part) {
            match angle_at_vertex(prev, vertex, next) {
                Some(angle) if angle <= threshold.degrees() => scan.spikes.push(SpikeVertex {
                    point: vertex,
                    part: part_idx,
                    index,
                    angle,
                }),
                Some(_) => {}
                None => match policy {
                    DegeneratePolicy::Skip => scan.skipped_degenerate += 1,
                    DegeneratePolicy::Fail => {
                        return Err(CorrectionError::DegenerateGeometry {
                            part: part_idx,
                            index,
                        })
                    }
                },
            }
        }
    }

    Ok(scan)
}

/// Find spike coordinates in a bare vertex sequence.
///
/// Vertices with an undefined angle are skipped. Fewer than 3 points yields
/// an empty result.
pub fn find_spikes_in_part(points: &[Point2D], threshold: AngleThreshold) -> Vec<Point2D> {
    interior_vertices(points)
        .filter_map(|(_, prev, vertex, next)| {
            angle_at_vertex(prev, vertex, next)
                .filter(|&angle| angle <= threshold.degrees())
                .map(|_| vertex)
        })
        .collect()
}

/// `(index, prev, vertex, next)` for indices 1..n-2.
fn interior_vertices(
    points: &[Point2D],
) -> impl Iterator<Item = (usize, Point2D, Point2D, Point2D)> + '_ {
    points
        .windows(3)
        .enumerate()
        .map(|(i, w)| (i + 1, w[0], w[1], w[2]))
}
