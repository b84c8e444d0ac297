//! Normalized position fix and its accuracy model
//!
//! A `Fix` is produced once by the position parser from a single modem
//! response and never changes afterwards. Its accuracy radius turns the
//! reported coordinate into a disc of positional uncertainty, which is what
//! the geofence check actually tests against a zone.

use crate::core::constants::EARTH_RADIUS_KM;
use crate::core::types::{CoordinateError, FixSource, LatHemisphere, LonHemisphere};
use crate::geofence::{Crs, GeometryEngine};
use serde::Serialize;
use std::fmt;

/// Normalized WGS84 position sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fix {
    timestamp: String,
    latitude: f64,
    longitude: f64,
    hemisphere_lat: Option<LatHemisphere>,
    hemisphere_lon: Option<LonHemisphere>,
    accuracy_radius_m: u32,
    source: FixSource,
}

/// Position plus uncertainty radius, independent of any geometry engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UncertaintyDisc {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
}

impl Fix {
    /// Build a fix from signed decimal degrees, rejecting out-of-range values
    pub fn new(
        timestamp: impl Into<String>,
        latitude: f64,
        longitude: f64,
        accuracy_radius_m: u32,
        source: FixSource,
    ) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError { field: "latitude", value: latitude });
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError { field: "longitude", value: longitude });
        }

        Ok(Self {
            timestamp: timestamp.into(),
            latitude,
            longitude,
            hemisphere_lat: None,
            hemisphere_lon: None,
            accuracy_radius_m,
            source,
        })
    }

    /// Attach the hemisphere indicators the modem reported alongside the value
    pub fn with_hemispheres(mut self, lat: Option<LatHemisphere>, lon: Option<LonHemisphere>) -> Self {
        self.hemisphere_lat = lat;
        self.hemisphere_lon = lon;
        self
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn hemisphere_lat(&self) -> Option<LatHemisphere> {
        self.hemisphere_lat
    }

    pub fn hemisphere_lon(&self) -> Option<LonHemisphere> {
        self.hemisphere_lon
    }

    pub fn accuracy_radius_m(&self) -> u32 {
        self.accuracy_radius_m
    }

    pub fn source(&self) -> FixSource {
        self.source
    }

    /// The fix as a disc: center of probability plus accuracy radius
    pub fn uncertainty_disc(&self) -> UncertaintyDisc {
        UncertaintyDisc {
            latitude: self.latitude,
            longitude: self.longitude,
            radius_m: self.accuracy_radius_m as f64,
        }
    }

    /// Point at (lon, lat) in WGS84 buffered by the accuracy radius
    pub fn to_buffered_geometry<E: GeometryEngine>(&self, engine: &E) -> E::Geometry {
        let disc = self.uncertainty_disc();
        let point = engine.point(disc.longitude, disc.latitude, Crs::Wgs84);
        engine.buffer(&point, disc.radius_m)
    }

    /// Great-circle distance to another fix in kilometers
    pub fn distance_to(&self, other: &Fix) -> f64 {
        great_circle_distance(self, other)
    }
}

impl fmt::Display for Fix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lat_ind = self.hemisphere_lat.map(|h| h.to_string()).unwrap_or_default();
        let lon_ind = self.hemisphere_lon.map(|h| h.to_string()).unwrap_or_default();
        write!(
            f,
            "Time: {}, Lat: {:.6}{}, Long: {:.6}{}, Accuracy: {}m ({:?})",
            self.timestamp, self.latitude, lat_ind, self.longitude, lon_ind,
            self.accuracy_radius_m, self.source
        )
    }
}

/// Haversine distance between two fixes in kilometers
pub fn great_circle_distance(a: &Fix, b: &Fix) -> f64 {
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geofence::PlanarEngine;

    fn fix(lat: f64, lon: f64) -> Fix {
        Fix::new("211223_120000.0", lat, lon, 10, FixSource::Satellite).unwrap()
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let a = fix(25.1412, 113.4712);
        assert!(great_circle_distance(&a, &a).abs() < 1e-9);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = fix(47.6062, -122.3321);
        let b = fix(45.5152, -122.6784);
        assert_eq!(great_circle_distance(&a, &b), great_circle_distance(&b, &a));
        assert!((a.distance_to(&b) - 234.0).abs() < 2.0);
    }

    #[test]
    fn test_one_degree_latitude_at_equator() {
        let a = fix(0.0, 0.0);
        let b = fix(1.0, 0.0);
        let d = great_circle_distance(&a, &b);
        assert!((d - 111.19).abs() < 111.19 * 0.01, "distance was {}", d);
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(Fix::new("", 91.0, 0.0, 10, FixSource::Satellite).is_err());
        assert!(Fix::new("", 0.0, -180.5, 10, FixSource::CellTower).is_err());
        assert!(Fix::new("", f64::NAN, 0.0, 10, FixSource::CellTower).is_err());
        assert!(Fix::new("", -90.0, 180.0, 0, FixSource::Satellite).is_ok());
    }

    #[test]
    fn test_uncertainty_disc_uses_accuracy_radius() {
        let f = Fix::new("t", 10.0, 20.0, 550, FixSource::CellTower).unwrap();
        let disc = f.uncertainty_disc();
        assert_eq!(disc.latitude, 10.0);
        assert_eq!(disc.longitude, 20.0);
        assert_eq!(disc.radius_m, 550.0);
    }

    #[test]
    fn test_buffered_geometry_is_wgs84_disc() {
        let engine = PlanarEngine::new();
        let f = Fix::new("t", 10.0, 20.0, 550, FixSource::CellTower).unwrap();
        let geometry = f.to_buffered_geometry(&engine);
        assert_eq!(geometry.crs(), &Crs::Wgs84);
        assert_eq!(geometry.buffer_m(), 550.0);
    }

    #[test]
    fn test_display_includes_hemispheres() {
        let f = fix(25.1412, 113.4712)
            .with_hemispheres(Some(LatHemisphere::N), Some(LonHemisphere::E));
        let text = f.to_string();
        assert!(text.contains("25.141200N"));
        assert!(text.contains("113.471200E"));
    }
}
