//! Geofence check against pre-loaded zones
//!
//! Zone polygons are buffered by their tolerance margin once, at load time.
//! The check itself is a pure predicate; the candidate must already be in
//! the zone's CRS.

pub mod geometry;
pub mod zone;

pub use geometry::{Crs, GeometryEngine, GeometryError, GeometryResult, PlanarEngine, PlanarGeometry, Shape};
pub use zone::{Zone, ZoneError, ZoneResult};

/// True iff at least one zone geometry intersects the candidate
pub fn intersects<E: GeometryEngine>(engine: &E, zone: &[E::Geometry], candidate: &E::Geometry) -> bool {
    engine.intersects_any(zone, candidate)
}
