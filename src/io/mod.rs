//! # Source and Output Collaborators
//!
//! The correction core never reads or writes files. Hosts plug these traits
//! around it:
//!
//! - [`PolylineSource`] reads the candidate lines and their spatial reference
//! - [`OutputCatalog`] creates a uniquely named output target
//! - [`FragmentWriter`] persists the cleaned fragments into that target
//!
//! File-backed implementations are provided for GeoJSON ([`GeoJsonSource`],
//! [`DirectoryCatalog`], [`GeoJsonWriter`]) and GPX ([`GpxSource`]).
//! Spatial references are passed through untouched.

mod geojson;
mod gpx_file;
pub mod naming;

pub use self::geojson::{
    feature_collection, polylines_from_geojson, DirectoryCatalog, GeoJsonSource, GeoJsonWriter,
};
pub use self::gpx_file::{polylines_from_gpx, GpxSource};
pub use naming::{next_versioned_name, DEFAULT_OUTPUT_BASE_NAME};

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::{CorrectionError, Polyline, Result};

/// An opaque coordinate reference descriptor, carried from source to output.
///
/// For GeoJSON this is the (legacy) `crs` member, kept verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpatialReference(Option<Value>);

impl SpatialReference {
    /// No spatial reference information.
    pub fn unknown() -> Self {
        Self(None)
    }

    /// Wrap a GeoJSON `crs` member.
    pub fn from_crs(crs: Value) -> Self {
        Self(Some(crs))
    }

    /// Longitude/latitude on WGS 84, the implicit reference of GPX.
    pub fn crs84() -> Self {
        Self::from_crs(serde_json::json!({
            "type": "name",
            "properties": { "name": "urn:ogc:def:crs:OGC:1.3:CRS84" }
        }))
    }

    pub fn is_known(&self) -> bool {
        self.0.is_some()
    }

    pub fn as_crs(&self) -> Option<&Value> {
        self.0.as_ref()
    }
}

/// A created output target.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputHandle {
    /// Versioned target name, e.g. `Cleaned_Lines_3`
    pub name: String,
    pub path: PathBuf,
    pub spatial_reference: SpatialReference,
}

/// Reads the polylines to correct.
pub trait PolylineSource {
    /// All line geometries of the source, in source order.
    fn read_polylines(&self) -> Result<Vec<Polyline>>;

    /// Spatial reference of the source geometry.
    fn spatial_reference(&self) -> Result<SpatialReference>;
}

/// Creates output targets with auto-incrementing names.
pub trait OutputCatalog {
    fn create_output_target(
        &self,
        base_name: &str,
        spatial_reference: &SpatialReference,
    ) -> Result<OutputHandle>;
}

/// Persists cleaned fragments to an output target.
pub trait FragmentWriter {
    fn write_fragments(&self, handle: &OutputHandle, fragments: &[Polyline]) -> Result<()>;
}

/// Pick a source implementation from the file extension.
///
/// `.gpx` reads GPX; `.json` and `.geojson` read GeoJSON.
pub fn open_source(path: &Path) -> Result<Box<dyn PolylineSource>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("gpx") => Ok(Box::new(GpxSource::new(path))),
        Some("json") | Some("geojson") => Ok(Box::new(GeoJsonSource::new(path))),
        _ => Err(CorrectionError::InvalidInput(format!(
            "unsupported source format: {}",
            path.display()
        ))),
    }
}
