//! Exclusion zones around spike vertices.

use log::{debug, warn};

use crate::kernel::{Area, GeometryKernel};
use crate::Point2D;

/// Unioned buffers around all spike vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct ExclusionZone {
    pub area: Area,
    /// Number of buffers that were built successfully
    pub buffer_count: usize,
}

/// Buffer every spike point by `radius` and union the results.
///
/// Points whose buffer fails are skipped. Returns `None` when there are no
/// points, every buffer fails, or the union is empty: there is nothing to
/// correct.
pub fn build_exclusion_zone<K: GeometryKernel + ?Sized>(
    kernel: &K,
    spike_points: &[Point2D],
    radius: f64,
) -> Option<ExclusionZone> {
    if spike_points.is_empty() {
        return None;
    }

    let mut buffers = Vec::with_capacity(spike_points.len());
    for point in spike_points {
        match kernel.buffer_point(*point, radius) {
            Some(area) => buffers.push(area),
            None => warn!(
                "[ExclusionZone] Buffer failed at ({:.3}, {:.3}) with radius {}",
                point.x, point.y, radius
            ),
        }
    }

    let buffer_count = buffers.len();
    debug!(
        "[ExclusionZone] Built {} of {} buffers",
        buffer_count,
        spike_points.len()
    );
    if buffer_count == 0 {
        return None;
    }

    let area = kernel.union_areas(buffers)?;
    if area.is_empty() {
        return None;
    }

    Some(ExclusionZone { area, buffer_count })
}
