//! Geometry engine abstraction and the built-in planar engine
//!
//! `PlanarEngine` keeps every geometry as a bare shape plus an accumulated
//! buffer distance. Buffering a shape by `d` is its Minkowski sum with a disc
//! of radius `d`, so two buffered shapes intersect exactly when the planar
//! distance between the bare shapes is at most the sum of their buffers.
//! This avoids approximating circles with polygons. Distances are measured
//! in meters on a local tangent plane around the candidate, since Web
//! Mercator units stretch with latitude.

use crate::core::constants::{EARTH_RADIUS_M, WGS84_EPSG};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_4;
use std::fmt;
use std::str::FromStr;

/// Semi-major axis used by spherical Web Mercator (m)
const WEB_MERCATOR_RADIUS_M: f64 = 6_378_137.0;

/// Errors raised by geometry construction and reprojection
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// CRS identifier the engine cannot handle
    UnsupportedCrs { name: String },
    /// Polygon ring with fewer than three distinct vertices
    DegeneratePolygon { vertices: usize },
    /// Non-finite coordinate value
    InvalidCoordinate { x: f64, y: f64 },
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::UnsupportedCrs { name } => write!(f, "Unsupported CRS: {}", name),
            GeometryError::DegeneratePolygon { vertices } => {
                write!(f, "Polygon needs at least 3 vertices, got {}", vertices)
            }
            GeometryError::InvalidCoordinate { x, y } => write!(f, "Invalid coordinate ({}, {})", x, y),
        }
    }
}

impl std::error::Error for GeometryError {}

pub type GeometryResult<T> = Result<T, GeometryError>;

/// Coordinate reference systems understood by `PlanarEngine`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Crs {
    /// EPSG:4326, x = longitude, y = latitude in degrees
    Wgs84,
    /// EPSG:3857, spherical Mercator in meters
    WebMercator,
    /// Equirectangular east/north meters around an origin
    LocalTangent { origin_lat: f64, origin_lon: f64 },
}

impl Crs {
    pub fn from_epsg(code: u32) -> GeometryResult<Self> {
        match code {
            WGS84_EPSG => Ok(Crs::Wgs84),
            3857 | 900913 => Ok(Crs::WebMercator),
            _ => Err(GeometryError::UnsupportedCrs { name: format!("EPSG:{}", code) }),
        }
    }

    pub fn epsg(&self) -> Option<u32> {
        match self {
            Crs::Wgs84 => Some(WGS84_EPSG),
            Crs::WebMercator => Some(3857),
            Crs::LocalTangent { .. } => None,
        }
    }

    /// (lon, lat) degrees to this CRS
    fn forward(&self, lonlat: Vector2<f64>) -> Vector2<f64> {
        match *self {
            Crs::Wgs84 => lonlat,
            Crs::WebMercator => {
                let lat = lonlat.y.clamp(-85.051_128_78, 85.051_128_78).to_radians();
                Vector2::new(
                    WEB_MERCATOR_RADIUS_M * lonlat.x.to_radians(),
                    WEB_MERCATOR_RADIUS_M * (FRAC_PI_4 + lat / 2.0).tan().ln(),
                )
            }
            Crs::LocalTangent { origin_lat, origin_lon } => Vector2::new(
                EARTH_RADIUS_M * (lonlat.x - origin_lon).to_radians() * origin_lat.to_radians().cos(),
                EARTH_RADIUS_M * (lonlat.y - origin_lat).to_radians(),
            ),
        }
    }

    /// This CRS to (lon, lat) degrees
    fn inverse(&self, xy: Vector2<f64>) -> Vector2<f64> {
        match *self {
            Crs::Wgs84 => xy,
            Crs::WebMercator => Vector2::new(
                (xy.x / WEB_MERCATOR_RADIUS_M).to_degrees(),
                (2.0 * (xy.y / WEB_MERCATOR_RADIUS_M).exp().atan() - 2.0 * FRAC_PI_4).to_degrees(),
            ),
            Crs::LocalTangent { origin_lat, origin_lon } => Vector2::new(
                origin_lon + (xy.x / (EARTH_RADIUS_M * origin_lat.to_radians().cos())).to_degrees(),
                origin_lat + (xy.y / EARTH_RADIUS_M).to_degrees(),
            ),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Wgs84 => write!(f, "EPSG:4326"),
            Crs::WebMercator => write!(f, "EPSG:3857"),
            Crs::LocalTangent { origin_lat, origin_lon } => write!(f, "LTP:{},{}", origin_lat, origin_lon),
        }
    }
}

impl FromStr for Crs {
    type Err = GeometryError;

    /// Accepts `EPSG:<code>`, `urn:ogc:def:crs:EPSG::<code>`, CRS84 names
    /// and `LTP:<lat>,<lon>` for a local tangent plane
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let unsupported = || GeometryError::UnsupportedCrs { name: name.to_string() };

        if name.eq_ignore_ascii_case("OGC:CRS84") || name.eq_ignore_ascii_case("urn:ogc:def:crs:OGC:1.3:CRS84") {
            return Ok(Crs::Wgs84);
        }

        if let Some(origin) = name.strip_prefix("LTP:") {
            let (lat, lon) = origin.split_once(',').ok_or_else(unsupported)?;
            let origin_lat: f64 = lat.trim().parse().map_err(|_| unsupported())?;
            let origin_lon: f64 = lon.trim().parse().map_err(|_| unsupported())?;
            return Ok(Crs::LocalTangent { origin_lat, origin_lon });
        }

        let upper = name.to_ascii_uppercase();
        let code = upper
            .strip_prefix("URN:OGC:DEF:CRS:EPSG::")
            .or_else(|| upper.strip_prefix("EPSG:"))
            .ok_or_else(unsupported)?;
        let code: u32 = code.parse().map_err(|_| unsupported())?;
        Crs::from_epsg(code)
    }
}

impl TryFrom<String> for Crs {
    type Error = GeometryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}

/// Operations the geofence needs from a geometry library
pub trait GeometryEngine {
    type Geometry;

    /// Point at `(x, y)` in `crs`; for geographic CRSs x is longitude
    fn point(&self, x: f64, y: f64, crs: Crs) -> Self::Geometry;

    /// Polygon from its exterior ring
    fn polygon(&self, ring: &[[f64; 2]], crs: Crs) -> GeometryResult<Self::Geometry>;

    /// Expand a geometry outward by a metric distance
    fn buffer(&self, geometry: &Self::Geometry, distance_m: f64) -> Self::Geometry;

    /// Express a geometry in another CRS
    fn reproject(&self, geometry: &Self::Geometry, to: Crs) -> GeometryResult<Self::Geometry>;

    /// Pairwise intersection test
    fn intersects(&self, a: &Self::Geometry, b: &Self::Geometry) -> bool;

    /// True if any geometry in `set` intersects `candidate`
    fn intersects_any(&self, set: &[Self::Geometry], candidate: &Self::Geometry) -> bool {
        set.iter().any(|geometry| self.intersects(geometry, candidate))
    }
}

/// Bare shape of a planar geometry
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Point(Vector2<f64>),
    /// Exterior ring without the closing vertex
    Polygon(Vec<Vector2<f64>>),
}

/// Shape plus accumulated outward buffer, tagged with its CRS
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarGeometry {
    crs: Crs,
    shape: Shape,
    buffer_m: f64,
}

impl PlanarGeometry {
    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn buffer_m(&self) -> f64 {
        self.buffer_m
    }

    fn map_vertices(&self, crs: Crs, f: impl Fn(Vector2<f64>) -> Vector2<f64>) -> Self {
        let shape = match &self.shape {
            Shape::Point(p) => Shape::Point(f(*p)),
            Shape::Polygon(ring) => Shape::Polygon(ring.iter().map(|v| f(*v)).collect()),
        };
        Self { crs, shape, buffer_m: self.buffer_m }
    }

    fn anchor(&self) -> Vector2<f64> {
        match &self.shape {
            Shape::Point(p) => *p,
            Shape::Polygon(ring) => ring[0],
        }
    }
}

/// Built-in engine for small-area geofencing
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarEngine;

impl PlanarEngine {
    pub fn new() -> Self {
        PlanarEngine
    }

    fn to_metric(&self, geometry: &PlanarGeometry, origin: Vector2<f64>) -> PlanarGeometry {
        let ltp = Crs::LocalTangent { origin_lat: origin.y, origin_lon: origin.x };
        geometry.map_vertices(ltp, |v| ltp.forward(v))
    }
}

impl GeometryEngine for PlanarEngine {
    type Geometry = PlanarGeometry;

    fn point(&self, x: f64, y: f64, crs: Crs) -> PlanarGeometry {
        PlanarGeometry {
            crs,
            shape: Shape::Point(Vector2::new(x, y)),
            buffer_m: 0.0,
        }
    }

    fn polygon(&self, ring: &[[f64; 2]], crs: Crs) -> GeometryResult<PlanarGeometry> {
        let mut vertices: Vec<Vector2<f64>> = Vec::with_capacity(ring.len());
        for [x, y] in ring.iter().copied() {
            if !x.is_finite() || !y.is_finite() {
                return Err(GeometryError::InvalidCoordinate { x, y });
            }
            let v = Vector2::new(x, y);
            if vertices.last() != Some(&v) {
                vertices.push(v);
            }
        }
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        if vertices.len() < 3 {
            return Err(GeometryError::DegeneratePolygon { vertices: vertices.len() });
        }

        Ok(PlanarGeometry {
            crs,
            shape: Shape::Polygon(vertices),
            buffer_m: 0.0,
        })
    }

    /// Outward buffers only; a negative distance leaves the geometry as is
    fn buffer(&self, geometry: &PlanarGeometry, distance_m: f64) -> PlanarGeometry {
        PlanarGeometry {
            buffer_m: geometry.buffer_m + distance_m.max(0.0),
            ..geometry.clone()
        }
    }

    fn reproject(&self, geometry: &PlanarGeometry, to: Crs) -> GeometryResult<PlanarGeometry> {
        if geometry.crs == to {
            return Ok(geometry.clone());
        }
        let from = geometry.crs;
        Ok(geometry.map_vertices(to, |v| to.forward(from.inverse(v))))
    }

    /// Geometries in different CRSs never intersect; reproject first.
    /// Polygon edges stay straight in the source CRS only to within the
    /// small-area approximation.
    fn intersects(&self, a: &PlanarGeometry, b: &PlanarGeometry) -> bool {
        if a.crs != b.crs {
            return false;
        }

        let distance = match a.crs {
            Crs::LocalTangent { .. } => shape_distance(&a.shape, &b.shape),
            crs => {
                let a = a.map_vertices(Crs::Wgs84, |v| crs.inverse(v));
                let b = b.map_vertices(Crs::Wgs84, |v| crs.inverse(v));
                let origin = b.anchor();
                shape_distance(&self.to_metric(&a, origin).shape, &self.to_metric(&b, origin).shape)
            }
        };

        distance <= a.buffer_m + b.buffer_m
    }
}

fn shape_distance(a: &Shape, b: &Shape) -> f64 {
    match (a, b) {
        (Shape::Point(p), Shape::Point(q)) => (p - q).norm(),
        (Shape::Point(p), Shape::Polygon(ring)) | (Shape::Polygon(ring), Shape::Point(p)) => {
            point_polygon_distance(p, ring)
        }
        (Shape::Polygon(r1), Shape::Polygon(r2)) => {
            if point_in_ring(&r1[0], r2) || point_in_ring(&r2[0], r1) {
                return 0.0;
            }
            edges(r1)
                .flat_map(|e1| edges(r2).map(move |e2| segment_distance(e1, e2)))
                .fold(f64::INFINITY, f64::min)
        }
    }
}

fn edges(ring: &[Vector2<f64>]) -> impl Iterator<Item = (Vector2<f64>, Vector2<f64>)> + '_ {
    (0..ring.len()).map(move |i| (ring[i], ring[(i + 1) % ring.len()]))
}

fn point_polygon_distance(p: &Vector2<f64>, ring: &[Vector2<f64>]) -> f64 {
    if point_in_ring(p, ring) {
        return 0.0;
    }
    edges(ring)
        .map(|(a, b)| point_segment_distance(p, &a, &b))
        .fold(f64::INFINITY, f64::min)
}

/// Even-odd ray casting
fn point_in_ring(p: &Vector2<f64>, ring: &[Vector2<f64>]) -> bool {
    let mut inside = false;
    for (a, b) in edges(ring) {
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

fn point_segment_distance(p: &Vector2<f64>, a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq == 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (a + ab * t - p).norm()
}

fn cross(u: &Vector2<f64>, v: &Vector2<f64>) -> f64 {
    u.x * v.y - u.y * v.x
}

fn segment_distance(s1: (Vector2<f64>, Vector2<f64>), s2: (Vector2<f64>, Vector2<f64>)) -> f64 {
    let (a, b) = s1;
    let (c, d) = s2;

    let d1 = cross(&(b - a), &(c - a));
    let d2 = cross(&(b - a), &(d - a));
    let d3 = cross(&(d - c), &(a - c));
    let d4 = cross(&(d - c), &(b - c));
    if d1 * d2 < 0.0 && d3 * d4 < 0.0 {
        return 0.0;
    }

    point_segment_distance(&a, &c, &d)
        .min(point_segment_distance(&b, &c, &d))
        .min(point_segment_distance(&c, &a, &b))
        .min(point_segment_distance(&d, &a, &b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(engine: &PlanarEngine, size: f64) -> PlanarGeometry {
        let ring = [[0.0, 0.0], [size, 0.0], [size, size], [0.0, size], [0.0, 0.0]];
        engine.polygon(&ring, Crs::WebMercator).unwrap()
    }

    #[test]
    fn test_crs_parsing() {
        assert_eq!("EPSG:4326".parse::<Crs>().unwrap(), Crs::Wgs84);
        assert_eq!("epsg:3857".parse::<Crs>().unwrap(), Crs::WebMercator);
        assert_eq!("urn:ogc:def:crs:EPSG::3857".parse::<Crs>().unwrap(), Crs::WebMercator);
        assert_eq!("urn:ogc:def:crs:OGC:1.3:CRS84".parse::<Crs>().unwrap(), Crs::Wgs84);
        assert_eq!(
            "LTP:46.5,6.6".parse::<Crs>().unwrap(),
            Crs::LocalTangent { origin_lat: 46.5, origin_lon: 6.6 }
        );
        assert!(matches!("EPSG:2056".parse::<Crs>(), Err(GeometryError::UnsupportedCrs { .. })));
        assert!("NAD27".parse::<Crs>().is_err());

        assert_eq!(Crs::from_epsg(900913).unwrap(), Crs::WebMercator);
        assert_eq!(Crs::WebMercator.epsg(), Some(3857));
        assert_eq!(Crs::Wgs84.epsg(), Some(4326));
        assert_eq!(Crs::LocalTangent { origin_lat: 0.0, origin_lon: 0.0 }.epsg(), None);
    }

    #[test]
    fn test_crs_serde() {
        let json = serde_json::to_string(&Crs::WebMercator).unwrap();
        assert_eq!(json, "\"EPSG:3857\"");
        let crs: Crs = serde_json::from_str("\"LTP:10,20\"").unwrap();
        assert_eq!(crs, Crs::LocalTangent { origin_lat: 10.0, origin_lon: 20.0 });
    }

    #[test]
    fn test_degenerate_polygon() {
        let engine = PlanarEngine::new();
        let result = engine.polygon(&[[0.0, 0.0], [1.0, 1.0], [0.0, 0.0]], Crs::WebMercator);
        assert_eq!(result, Err(GeometryError::DegeneratePolygon { vertices: 2 }));
    }

    #[test]
    fn test_point_inside_polygon() {
        let engine = PlanarEngine::new();
        let zone = square(&engine, 100.0);
        let inside = engine.point(50.0, 50.0, Crs::WebMercator);
        assert!(engine.intersects(&zone, &inside));
    }

    #[test]
    fn test_buffers_add_up() {
        let engine = PlanarEngine::new();
        let zone = engine.buffer(&square(&engine, 100.0), 50.0);

        // 120m right of the edge: out of reach of the 50m margin alone
        let outside = engine.point(220.0, 50.0, Crs::WebMercator);
        assert!(!engine.intersects(&zone, &outside));

        // a 70m accuracy disc closes the gap
        let uncertain = engine.buffer(&outside, 70.0);
        assert!(engine.intersects(&zone, &uncertain));
    }

    #[test]
    fn test_corner_distance_is_euclidean() {
        let engine = PlanarEngine::new();
        let zone = engine.buffer(&square(&engine, 100.0), 50.0);
        // 40m off both axes from the corner: 56.6m away
        assert!(!engine.intersects(&zone, &engine.point(140.0, 140.0, Crs::WebMercator)));
        assert!(engine.intersects(&zone, &engine.point(130.0, 130.0, Crs::WebMercator)));
    }

    #[test]
    fn test_polygon_polygon() {
        let engine = PlanarEngine::new();
        let a = square(&engine, 100.0);
        let ring = [[150.0, 0.0], [250.0, 0.0], [250.0, 100.0], [150.0, 100.0]];
        let b = engine.polygon(&ring, Crs::WebMercator).unwrap();
        assert!(!engine.intersects(&a, &b));
        assert!(engine.intersects(&engine.buffer(&a, 50.0), &b));

        // crossing edges without containing each other's first vertex
        let cross_ring = [[-10.0, 40.0], [110.0, 40.0], [110.0, 60.0], [-10.0, 60.0]];
        let c = engine.polygon(&cross_ring, Crs::WebMercator).unwrap();
        assert!(engine.intersects(&a, &c));
    }

    #[test]
    fn test_mixed_crs_never_intersects() {
        let engine = PlanarEngine::new();
        let zone = square(&engine, 100.0);
        let p = engine.point(50.0, 50.0, Crs::Wgs84);
        assert!(!engine.intersects(&zone, &p));
    }

    #[test]
    fn test_web_mercator_round_trip() {
        let engine = PlanarEngine::new();
        let p = engine.point(113.4712, 25.1412, Crs::Wgs84);
        let projected = engine.reproject(&engine.buffer(&p, 10.0), Crs::WebMercator).unwrap();
        assert_eq!(projected.buffer_m(), 10.0);

        let back = engine.reproject(&projected, Crs::Wgs84).unwrap();
        match back.shape() {
            Shape::Point(v) => {
                assert!((v.x - 113.4712).abs() < 1e-9);
                assert!((v.y - 25.1412).abs() < 1e-9);
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_web_mercator_distance_is_metric() {
        let engine = PlanarEngine::new();
        // At 60N one Mercator unit is only half a meter on the ground
        let origin = engine.reproject(&engine.point(0.0, 60.0, Crs::Wgs84), Crs::WebMercator).unwrap();
        let v = match origin.shape() {
            Shape::Point(v) => *v,
            other => panic!("unexpected shape {:?}", other),
        };
        let east = engine.point(v.x + 150.0, v.y, Crs::WebMercator);
        assert!(engine.intersects(&engine.buffer(&origin, 80.0), &east));
        assert!(!engine.intersects(&engine.buffer(&origin, 70.0), &east));
    }

    #[test]
    fn test_geographic_intersection_uses_meters() {
        let engine = PlanarEngine::new();
        let a = engine.point(0.0, 0.0, Crs::Wgs84);
        // ~111m north
        let b = engine.point(0.0, 0.001, Crs::Wgs84);
        assert!(!engine.intersects(&engine.buffer(&a, 50.0), &engine.buffer(&b, 50.0)));
        assert!(engine.intersects(&engine.buffer(&a, 60.0), &engine.buffer(&b, 60.0)));
    }

    #[test]
    fn test_intersects_any() {
        let engine = PlanarEngine::new();
        let far = engine.polygon(&[[1000.0, 1000.0], [1100.0, 1000.0], [1100.0, 1100.0]], Crs::WebMercator).unwrap();
        let near = square(&engine, 100.0);
        let p = engine.point(50.0, 50.0, Crs::WebMercator);
        assert!(!engine.intersects_any(&[far.clone()], &p));
        assert!(engine.intersects_any(&[far, near], &p));
        assert!(!engine.intersects_any(&[], &p));
    }
}
