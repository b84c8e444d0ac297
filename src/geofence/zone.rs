//! Zone loading and buffering
//!
//! A zone file is a GeoJSON-style document: an optional `crs` (a plain
//! string or the legacy `{"type": "name", "properties": {"name": ...}}`
//! member, default EPSG:4326) and a `features` array holding `Polygon` /
//! `MultiPolygon` geometries, bare or wrapped in `Feature` objects.
//! Multi-part geometries are exploded into single polygons; only exterior
//! rings are kept.

use crate::geofence::geometry::{Crs, GeometryEngine, GeometryError, PlanarEngine, PlanarGeometry};
use log::{info, warn};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors raised while loading a zone
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneError {
    /// Zone file could not be read
    Io { path: String, message: String },
    /// Zone document did not deserialize
    Format { message: String },
    /// Document holds no polygon
    Empty,
    /// A polygon or the CRS was rejected
    Geometry(GeometryError),
}

impl fmt::Display for ZoneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneError::Io { path, message } => write!(f, "Failed to read zone file '{}': {}", path, message),
            ZoneError::Format { message } => write!(f, "Invalid zone document: {}", message),
            ZoneError::Empty => write!(f, "Zone contains no polygons"),
            ZoneError::Geometry(e) => write!(f, "Invalid zone geometry: {}", e),
        }
    }
}

impl std::error::Error for ZoneError {}

impl From<GeometryError> for ZoneError {
    fn from(error: GeometryError) -> Self {
        ZoneError::Geometry(error)
    }
}

pub type ZoneResult<T> = Result<T, ZoneError>;

type Ring = Vec<[f64; 2]>;

#[derive(Debug, Deserialize)]
struct ZoneDocument {
    #[serde(default)]
    crs: Option<CrsMember>,
    features: Vec<FeatureEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CrsMember {
    Name(String),
    Named { properties: CrsProperties },
}

#[derive(Debug, Deserialize)]
struct CrsProperties {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureEntry {
    Feature { geometry: ZoneGeometry },
    Bare(ZoneGeometry),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
enum ZoneGeometry {
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

impl ZoneGeometry {
    /// Exterior ring of every single-part polygon
    fn explode(self) -> Vec<Ring> {
        match self {
            ZoneGeometry::Polygon(rings) => rings.into_iter().take(1).collect(),
            ZoneGeometry::MultiPolygon(polygons) => polygons
                .into_iter()
                .filter_map(|rings| rings.into_iter().next())
                .collect(),
        }
    }
}

/// Read-only geographic zone, expanded by a tolerance margin at load time
#[derive(Debug, Clone)]
pub struct Zone {
    source: Option<PathBuf>,
    crs: Crs,
    parts: Vec<PlanarGeometry>,
    expanded: Vec<PlanarGeometry>,
    margin_m: f64,
    engine: PlanarEngine,
}

impl Zone {
    /// Load a zone file and buffer it by `margin_m`
    pub fn load<P: AsRef<Path>>(path: P, margin_m: f64) -> ZoneResult<Self> {
        let path = path.as_ref();
        let path_str = path.to_string_lossy().to_string();

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        if !extension.eq_ignore_ascii_case("json") && !extension.eq_ignore_ascii_case("geojson") {
            warn!("Zone file '{}' does not have a .json/.geojson extension", path_str);
        }

        let content = fs::read_to_string(path).map_err(|e| ZoneError::Io {
            path: path_str.clone(),
            message: e.to_string(),
        })?;

        let mut zone = Self::from_json_str(&content, margin_m)?;
        zone.source = Some(path.to_path_buf());
        info!("Loaded zone '{}': {} part(s) in {}, margin {}m", path_str, zone.parts.len(), zone.crs, margin_m);
        Ok(zone)
    }

    /// Parse a zone document held in memory
    pub fn from_json_str(content: &str, margin_m: f64) -> ZoneResult<Self> {
        let document: ZoneDocument = serde_json::from_str(content)
            .map_err(|e| ZoneError::Format { message: e.to_string() })?;

        let crs = match document.crs {
            None => Crs::Wgs84,
            Some(CrsMember::Name(name)) => name.parse()?,
            Some(CrsMember::Named { properties }) => properties.name.parse()?,
        };

        let rings: Vec<Ring> = document
            .features
            .into_iter()
            .flat_map(|entry| match entry {
                FeatureEntry::Feature { geometry } | FeatureEntry::Bare(geometry) => geometry.explode(),
            })
            .collect();

        Self::from_rings(crs, &rings, margin_m)
    }

    /// Build a zone from exterior rings already expressed in `crs`
    pub fn from_rings(crs: Crs, rings: &[Ring], margin_m: f64) -> ZoneResult<Self> {
        if rings.is_empty() {
            return Err(ZoneError::Empty);
        }

        let engine = PlanarEngine::new();
        let parts = rings
            .iter()
            .map(|ring| engine.polygon(ring, crs))
            .collect::<Result<Vec<_>, _>>()?;

        let mut zone = Self {
            source: None,
            crs,
            parts,
            expanded: Vec::new(),
            margin_m: 0.0,
            engine,
        };
        zone.rebuffer(margin_m);
        Ok(zone)
    }

    /// Replace the tolerance margin, rebuilding the expanded parts
    pub fn rebuffer(&mut self, margin_m: f64) {
        self.margin_m = margin_m.max(0.0);
        self.expanded = self
            .parts
            .iter()
            .map(|part| self.engine.buffer(part, self.margin_m))
            .collect();
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// CRS the zone was declared in
    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn margin_m(&self) -> f64 {
        self.margin_m
    }

    /// Single-part polygons as loaded
    pub fn parts(&self) -> &[PlanarGeometry] {
        &self.parts
    }

    /// Parts buffered by the margin
    pub fn expanded(&self) -> &[PlanarGeometry] {
        &self.expanded
    }

    pub fn engine(&self) -> &PlanarEngine {
        &self.engine
    }

    /// Test a candidate already expressed in the zone's CRS
    pub fn intersects(&self, candidate: &PlanarGeometry) -> bool {
        crate::geofence::intersects(&self.engine, &self.expanded, candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::DEFAULT_ZONE_MARGIN_M;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SQUARE_3857: &str = r#"{
        "crs": "EPSG:3857",
        "features": [
            {"type": "Polygon", "coordinates": [[[0, 0], [100, 0], [100, 100], [0, 100], [0, 0]]]}
        ]
    }"#;

    #[test]
    fn test_polygon_inside_and_outside() {
        let zone = Zone::from_json_str(SQUARE_3857, 50.0).unwrap();
        let engine = PlanarEngine::new();

        assert_eq!(zone.crs(), Crs::WebMercator);
        assert!(zone.intersects(&engine.point(50.0, 50.0, Crs::WebMercator)));
        assert!(zone.intersects(&engine.point(140.0, 50.0, Crs::WebMercator)));
        assert!(!zone.intersects(&engine.point(151.0, 50.0, Crs::WebMercator)));
    }

    #[test]
    fn test_multipolygon_is_exploded() {
        let doc = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
            "features": [
                {"type": "Feature", "properties": {"name": "blue line"}, "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[0, 0], [10, 0], [10, 10], [0, 0]]],
                        [[[100, 100], [110, 100], [110, 110], [100, 100]], [[101, 101], [102, 101], [102, 102], [101, 101]]]
                    ]
                }}
            ]
        }"#;

        let zone = Zone::from_json_str(doc, 0.0).unwrap();
        assert_eq!(zone.parts().len(), 2);
        assert_eq!(zone.expanded().len(), 2);
        assert_eq!(zone.crs(), Crs::WebMercator);
    }

    #[test]
    fn test_default_crs_is_wgs84() {
        let doc = r#"{"features": [{"type": "Polygon", "coordinates": [[[6.0, 46.0], [6.1, 46.0], [6.1, 46.1], [6.0, 46.0]]]}]}"#;
        let zone = Zone::from_json_str(doc, DEFAULT_ZONE_MARGIN_M).unwrap();
        assert_eq!(zone.crs(), Crs::Wgs84);
        assert_eq!(zone.margin_m(), 50.0);
    }

    #[test]
    fn test_rebuffer() {
        let mut zone = Zone::from_json_str(SQUARE_3857, 50.0).unwrap();
        let engine = PlanarEngine::new();
        let p = engine.point(180.0, 50.0, Crs::WebMercator);
        assert!(!zone.intersects(&p));

        zone.rebuffer(100.0);
        assert!(zone.intersects(&p));
        assert_eq!(zone.expanded()[0].buffer_m(), 100.0);
        assert_eq!(zone.parts()[0].buffer_m(), 0.0);
    }

    #[test]
    fn test_load_errors() {
        assert_eq!(Zone::from_json_str(r#"{"features": []}"#, 50.0).unwrap_err(), ZoneError::Empty);
        assert!(matches!(Zone::from_json_str("not json", 50.0), Err(ZoneError::Format { .. })));
        assert!(matches!(
            Zone::from_json_str(r#"{"crs": "EPSG:2056", "features": []}"#, 50.0),
            Err(ZoneError::Geometry(GeometryError::UnsupportedCrs { .. }))
        ));
        assert!(matches!(Zone::load("/nonexistent/zone.json", 50.0), Err(ZoneError::Io { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SQUARE_3857.as_bytes()).unwrap();

        let zone = Zone::load(file.path(), 50.0).unwrap();
        assert_eq!(zone.source(), Some(file.path()));
        assert_eq!(zone.parts().len(), 1);
    }
}
