//! GeoJSON source, directory catalog and writer.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    next_versioned_name, FragmentWriter, OutputCatalog, OutputHandle, PolylineSource,
    SpatialReference,
};
use crate::{CorrectionError, Point2D, Polyline, Result};

/// Attempts at claiming a fresh output name before giving up.
const CREATE_ATTEMPTS: usize = 3;

/// Line geometries understood by the reader; everything else is skipped.
#[derive(Deserialize)]
#[serde(tag = "type")]
enum LineGeometry {
    LineString { coordinates: Vec<Vec<f64>> },
    MultiLineString { coordinates: Vec<Vec<Vec<f64>>> },
    #[serde(other)]
    Other,
}

impl LineGeometry {
    fn into_polyline(self) -> Result<Option<Polyline>> {
        let parts = match self {
            LineGeometry::LineString { coordinates } => vec![to_points(coordinates)?],
            LineGeometry::MultiLineString { coordinates } => coordinates
                .into_iter()
                .map(to_points)
                .collect::<Result<Vec<_>>>()?,
            LineGeometry::Other => return Ok(None),
        };
        Ok(Polyline::from_parts_lossy(parts))
    }
}

fn to_points(coords: Vec<Vec<f64>>) -> Result<Vec<Point2D>> {
    coords
        .into_iter()
        .map(|c| match c.as_slice() {
            [x, y, ..] => Ok(Point2D::new(*x, *y)),
            _ => Err(CorrectionError::InvalidInput(format!(
                "position needs at least 2 coordinates, got {}",
                c.len()
            ))),
        })
        .collect()
}

/// Reads LineString and MultiLineString geometries from a GeoJSON file.
///
/// Accepts a FeatureCollection, a single Feature or a bare geometry.
/// Non-line geometries and features without geometry are skipped.
#[derive(Debug, Clone)]
pub struct GeoJsonSource {
    path: PathBuf,
}

impl GeoJsonSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn load(&self) -> Result<Value> {
        let reader = BufReader::new(File::open(&self.path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Parse line geometries out of an in-memory GeoJSON document.
pub fn polylines_from_geojson(doc: &Value) -> Result<Vec<Polyline>> {
    let geometries: Vec<&Value> = match doc.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => doc
            .get("features")
            .and_then(Value::as_array)
            .map(|features| {
                features
                    .iter()
                    .filter_map(|f| f.get("geometry"))
                    .collect()
            })
            .unwrap_or_default(),
        Some("Feature") => doc.get("geometry").into_iter().collect(),
        Some(_) => vec![doc],
        None => {
            return Err(CorrectionError::InvalidInput(
                "GeoJSON object has no type member".to_string(),
            ))
        }
    };

    let mut polylines = Vec::new();
    for geometry in geometries {
        if geometry.is_null() {
            continue;
        }
        let parsed: LineGeometry = serde_json::from_value(geometry.clone())?;
        match parsed.into_polyline()? {
            Some(polyline) => polylines.push(polyline),
            None => debug!("[GeoJsonSource] Skipping non-line or empty geometry"),
        }
    }
    Ok(polylines)
}

impl PolylineSource for GeoJsonSource {
    fn read_polylines(&self) -> Result<Vec<Polyline>> {
        let polylines = polylines_from_geojson(&self.load()?)?;
        info!(
            "[GeoJsonSource] Read {} polylines from {}",
            polylines.len(),
            self.path.display()
        );
        Ok(polylines)
    }

    fn spatial_reference(&self) -> Result<SpatialReference> {
        Ok(match self.load()?.get("crs") {
            Some(crs) if !crs.is_null() => SpatialReference::from_crs(crs.clone()),
            _ => SpatialReference::unknown(),
        })
    }
}

/// Output catalog backed by a directory of `.geojson` files.
///
/// Each target is `<dir>/<base>_<N>.geojson`, with `N` one past the highest
/// existing version.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    dir: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stems of the `.geojson` files currently in the directory.
    fn existing_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "geojson") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        Ok(names)
    }
}

impl OutputCatalog for DirectoryCatalog {
    fn create_output_target(
        &self,
        base_name: &str,
        spatial_reference: &SpatialReference,
    ) -> Result<OutputHandle> {
        fs::create_dir_all(&self.dir)?;

        for attempt in 1..=CREATE_ATTEMPTS {
            let existing = self.existing_names()?;
            let name = next_versioned_name(existing.iter().map(String::as_str), base_name);
            let path = self.dir.join(format!("{}.geojson", name));

            // create_new claims the name atomically against concurrent writers
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    let handle = OutputHandle {
                        name,
                        path,
                        spatial_reference: spatial_reference.clone(),
                    };
                    write_collection(file, &handle, &[])?;
                    info!("[DirectoryCatalog] Created {}", handle.path.display());
                    return Ok(handle);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    warn!(
                        "[DirectoryCatalog] {} was taken (attempt {}/{})",
                        name, attempt, CREATE_ATTEMPTS
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CorrectionError::InvalidInput(format!(
            "could not claim a free {} name in {}",
            base_name,
            self.dir.display()
        )))
    }
}

/// Writes fragments as a GeoJSON FeatureCollection, one feature per fragment.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoJsonWriter;

impl FragmentWriter for GeoJsonWriter {
    fn write_fragments(&self, handle: &OutputHandle, fragments: &[Polyline]) -> Result<()> {
        let file = File::create(&handle.path)?;
        write_collection(file, handle, fragments)?;
        info!(
            "[GeoJsonWriter] Wrote {} fragments to {}",
            fragments.len(),
            handle.path.display()
        );
        Ok(())
    }
}

fn write_collection(file: File, handle: &OutputHandle, fragments: &[Polyline]) -> Result<()> {
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &feature_collection(handle, fragments))?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Build the FeatureCollection document for `fragments`.
pub fn feature_collection(handle: &OutputHandle, fragments: &[Polyline]) -> Value {
    let features: Vec<Value> = fragments
        .iter()
        .enumerate()
        .map(|(i, fragment)| {
            json!({
                "type": "Feature",
                "properties": {
                    "fid": i + 1,
                    "parts": fragment.part_count(),
                    "length": fragment.length(),
                },
                "geometry": geometry_json(fragment),
            })
        })
        .collect();

    let mut collection = json!({
        "type": "FeatureCollection",
        "name": handle.name,
        "features": features,
    });
    if let (Some(crs), Some(obj)) = (
        handle.spatial_reference.as_crs(),
        collection.as_object_mut(),
    ) {
        obj.insert("crs".to_string(), crs.clone());
    }
    collection
}

fn geometry_json(polyline: &Polyline) -> Value {
    let part_coords = |part: &Vec<Point2D>| -> Vec<[f64; 2]> {
        part.iter().map(|p| [p.x, p.y]).collect()
    };
    match polyline.parts() {
        [single] => json!({
            "type": "LineString",
            "coordinates": part_coords(single),
        }),
        parts => json!({
            "type": "MultiLineString",
            "coordinates": parts.iter().map(part_coords).collect::<Vec<_>>(),
        }),
    }
}
