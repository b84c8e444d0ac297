//! Physical constants and system defaults

/// Mean Earth radius used by the haversine distance (km)
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Mean Earth radius used by the local tangent plane projection (m)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// EPSG code of the WGS84 geographic CRS every fix is reported in
pub const WGS84_EPSG: u32 = 4326;

/// Default accuracy radius attached to satellite fixes (m)
pub const DEFAULT_SATELLITE_ACCURACY_M: u32 = 10;

/// Default outward buffer applied to zone polygons at load time (m)
pub const DEFAULT_ZONE_MARGIN_M: f64 = 50.0;

/// Satellite attempts made before falling back to the cell-tower fix
pub const DEFAULT_MAX_SATELLITE_ATTEMPTS: u8 = 2;

/// Window a single modem command may take to answer (ms)
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 3000;
