//! GPX source.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use gpx::{read, Gpx};
use log::{debug, info};

use super::{PolylineSource, SpatialReference};
use crate::{Point2D, Polyline, Result};

/// Reads tracks and routes from a GPX file.
///
/// Each track becomes one polyline with one part per track segment; each
/// route becomes a single-part polyline. Coordinates are `(lon, lat)`.
#[derive(Debug, Clone)]
pub struct GpxSource {
    path: PathBuf,
}

impl GpxSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

/// Extract line geometries from a parsed GPX document.
///
/// Segments with fewer than 2 points are dropped; tracks left without any
/// segment are skipped.
pub fn polylines_from_gpx(gpx: &Gpx) -> Vec<Polyline> {
    let mut polylines = Vec::new();

    for track in &gpx.tracks {
        let parts: Vec<Vec<Point2D>> = track
            .segments
            .iter()
            .map(|segment| {
                segment
                    .points
                    .iter()
                    .map(|wpt| Point2D::new(wpt.point().x(), wpt.point().y()))
                    .collect()
            })
            .collect();
        match Polyline::from_parts_lossy(parts) {
            Some(polyline) => polylines.push(polyline),
            None => debug!(
                "[GpxSource] Skipping track {:?} without usable segments",
                track.name
            ),
        }
    }

    for route in &gpx.routes {
        let points = route
            .points
            .iter()
            .map(|wpt| Point2D::new(wpt.point().x(), wpt.point().y()))
            .collect();
        if let Some(polyline) = Polyline::single(points) {
            polylines.push(polyline);
        }
    }

    polylines
}

impl PolylineSource for GpxSource {
    fn read_polylines(&self) -> Result<Vec<Polyline>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let gpx = read(reader)?;
        let polylines = polylines_from_gpx(&gpx);
        info!(
            "[GpxSource] Read {} polylines from {}",
            polylines.len(),
            self.path.display()
        );
        Ok(polylines)
    }

    fn spatial_reference(&self) -> Result<SpatialReference> {
        Ok(SpatialReference::crs84())
    }
}
