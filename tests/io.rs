//! Tests for the GeoJSON / GPX collaborators and output naming

use std::fs;
use std::path::PathBuf;

use despike::io::{
    next_versioned_name, open_source, polylines_from_geojson, DirectoryCatalog, FragmentWriter,
    GeoJsonSource, GeoJsonWriter, GpxSource, OutputCatalog, PolylineSource, SpatialReference,
    DEFAULT_OUTPUT_BASE_NAME,
};
use despike::{correct, CorrectionError, Point2D, Polyline};
use serde_json::json;

/// Fresh scratch directory per test.
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("despike-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn line(coords: &[(f64, f64)]) -> Polyline {
    Polyline::single(coords.iter().map(|&(x, y)| Point2D::new(x, y)).collect()).unwrap()
}

#[test]
fn test_next_versioned_name() {
    let none: [&str; 0] = [];
    assert_eq!(next_versioned_name(none, "Cleaned_Lines"), "Cleaned_Lines_1");

    let existing = [
        "Cleaned_Lines_2",
        "Cleaned_Lines_10",
        "Cleaned_Lines_x",
        "Cleaned_Lines_",
        "Cleaned_Lines",
        "Other_Lines_99",
    ];
    assert_eq!(next_versioned_name(existing, "Cleaned_Lines"), "Cleaned_Lines_11");
}

#[test]
fn test_geojson_reads_line_geometries() {
    let doc = json!({
        "type": "FeatureCollection",
        "features": [
            { "type": "Feature", "properties": {}, "geometry": {
                "type": "LineString", "coordinates": [[0.0, 0.0], [5.0, 0.0, 12.0]] } },
            { "type": "Feature", "properties": {}, "geometry": {
                "type": "Point", "coordinates": [1.0, 1.0] } },
            { "type": "Feature", "properties": {}, "geometry": null },
            { "type": "Feature", "properties": {}, "geometry": {
                "type": "MultiLineString",
                "coordinates": [[[0.0, 5.0], [1.0, 5.0]], [[3.0, 3.0]], [[2.0, 5.0], [3.0, 5.0]]] } }
        ]
    });

    let polylines = polylines_from_geojson(&doc).unwrap();
    assert_eq!(polylines.len(), 2);
    assert_eq!(polylines[0], line(&[(0.0, 0.0), (5.0, 0.0)]));
    // The one-point part is dropped
    assert_eq!(polylines[1].part_count(), 2);
}

#[test]
fn test_geojson_rejects_short_positions() {
    let doc = json!({ "type": "LineString", "coordinates": [[0.0], [1.0, 1.0]] });
    assert!(matches!(
        polylines_from_geojson(&doc),
        Err(CorrectionError::InvalidInput(_))
    ));

    let untyped = json!({ "features": [] });
    assert!(polylines_from_geojson(&untyped).is_err());
}

#[test]
fn test_catalog_versions_outputs() {
    let dir = scratch_dir("catalog");
    let catalog = DirectoryCatalog::new(&dir);
    let srs = SpatialReference::unknown();

    let first = catalog
        .create_output_target(DEFAULT_OUTPUT_BASE_NAME, &srs)
        .unwrap();
    let second = catalog
        .create_output_target(DEFAULT_OUTPUT_BASE_NAME, &srs)
        .unwrap();

    assert_eq!(first.name, "Cleaned_Lines_1");
    assert_eq!(second.name, "Cleaned_Lines_2");
    assert!(first.path.exists());
    assert!(second.path.exists());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_correct_and_write_round_trip() {
    let dir = scratch_dir("roundtrip");
    let input_path = dir.join("input.geojson");
    let crs = json!({ "type": "name", "properties": { "name": "EPSG:2056" } });
    let doc = json!({
        "type": "FeatureCollection",
        "crs": crs.clone(),
        "features": [
            { "type": "Feature", "properties": {}, "geometry": {
                "type": "LineString", "coordinates": [[0.0, 0.0], [5.0, 0.0], [5.0, 5.0]] } }
        ]
    });
    fs::write(&input_path, serde_json::to_string(&doc).unwrap()).unwrap();

    let source = open_source(&input_path).unwrap();
    let lines = source.read_polylines().unwrap();
    let srs = source.spatial_reference().unwrap();
    assert_eq!(srs.as_crs(), Some(&crs));

    let result = correct(&lines, 100.0, 1.5).unwrap();

    let out_dir = dir.join("out");
    let catalog = DirectoryCatalog::new(&out_dir);
    let handle = catalog
        .create_output_target(DEFAULT_OUTPUT_BASE_NAME, &srs)
        .unwrap();
    GeoJsonWriter
        .write_fragments(&handle, &result.fragments)
        .unwrap();

    let written = GeoJsonSource::new(&handle.path);
    let reread = written.read_polylines().unwrap();
    assert_eq!(reread.len(), result.fragments.len());
    for (a, b) in reread.iter().zip(&result.fragments) {
        assert_eq!(a.part_count(), b.part_count());
        for (p, q) in a.points().zip(b.points()) {
            assert!((p.x - q.x).abs() < 1e-9 && (p.y - q.y).abs() < 1e-9);
        }
    }
    assert_eq!(written.spatial_reference().unwrap(), srs);

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&handle.path).unwrap()).unwrap();
    assert_eq!(raw["name"], "Cleaned_Lines_1");
    assert_eq!(raw["features"][0]["properties"]["fid"], 1);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_gpx_tracks_and_routes() {
    let dir = scratch_dir("gpx");
    let path = dir.join("tracks.gpx");
    fs::write(
        &path,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="despike-test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>survey</name>
    <trkseg>
      <trkpt lat="1.0" lon="2.0"></trkpt>
      <trkpt lat="1.5" lon="2.5"></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="3.0" lon="3.0"></trkpt>
    </trkseg>
  </trk>
  <rte>
    <rtept lat="0.0" lon="0.0"></rtept>
    <rtept lat="0.0" lon="1.0"></rtept>
  </rte>
</gpx>
"#,
    )
    .unwrap();

    let source = GpxSource::new(&path);
    let polylines = source.read_polylines().unwrap();
    assert_eq!(polylines.len(), 2);
    assert_eq!(polylines[0], line(&[(2.0, 1.0), (2.5, 1.5)]));
    assert_eq!(polylines[1], line(&[(0.0, 0.0), (1.0, 0.0)]));
    assert_eq!(
        source.spatial_reference().unwrap(),
        SpatialReference::crs84()
    );

    // Extension dispatch picks the GPX reader
    assert_eq!(open_source(&path).unwrap().read_polylines().unwrap().len(), 2);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_unsupported_source_format() {
    assert!(matches!(
        open_source(std::path::Path::new("lines.shp")),
        Err(CorrectionError::InvalidInput(_))
    ));
}
