use crate::core::constants::DEFAULT_SATELLITE_ACCURACY_M;
use crate::core::{Fix, FixSource, LatHemisphere, LonHemisphere};
use crate::processing::commands::{CELL_TOWER_MARKER, SATELLITE_MARKER};
use std::fmt;

/// Fields a satellite payload must carry: lat, N/S, lon, E/W, date, time
const SATELLITE_FIELDS: usize = 6;

/// Fields a cell-tower payload must carry: error code, lat, lon, radius
const CELL_TOWER_MIN_FIELDS: usize = 4;

/// Errors that can occur while decoding a positioning response
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The response prefix token is not in the response
    MissingMarker { marker: &'static str },
    /// Payload has fewer comma-separated fields than the format requires
    FieldCount { expected: usize, found: usize },
    /// A field could not be decoded
    InvalidField { field: &'static str, value: String },
    /// Decoded coordinate outside WGS84 ranges
    OutOfRange { field: &'static str, value: f64 },
    /// The location service answered with a non-zero error code
    ModemError { code: u32 },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MissingMarker { marker } => write!(f, "Response marker {} not found", marker),
            ParseError::FieldCount { expected, found } => write!(f, "Expected at least {} fields, got {}", expected, found),
            ParseError::InvalidField { field, value } => write!(f, "Invalid {}: {:?}", field, value),
            ParseError::OutOfRange { field, value } => write!(f, "{} out of range: {}", field, value),
            ParseError::ModemError { code } => write!(f, "Location service error code {}", code),
        }
    }
}

impl std::error::Error for ParseError {}

/// Result of decoding one positioning response
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// A complete, in-range fix
    Fix(Fix),
    /// The receiver answered but has no satellites locked yet
    NoFix,
    /// The answer did not fit the expected schema
    Malformed(ParseError),
}

impl ParseOutcome {
    pub fn into_fix(self) -> Option<Fix> {
        match self {
            ParseOutcome::Fix(fix) => Some(fix),
            _ => None,
        }
    }
}

/// Convert a packed `ddmm.mmmm` / `dddmm.mmmm` value to decimal degrees
pub fn sentence_to_degrees(value: f64) -> f64 {
    let degrees = (value / 100.0).floor();
    let minutes = value % 100.0;
    degrees + minutes / 60.0
}

/// Decoder for `+CGPSINFO` and `+CLBS` answers
pub struct PositionParser {
    satellite_accuracy_m: u32,
}

impl PositionParser {
    /// Create a parser with the default satellite accuracy radius
    pub fn new() -> Self {
        Self {
            satellite_accuracy_m: DEFAULT_SATELLITE_ACCURACY_M,
        }
    }

    /// Create a parser that stamps satellite fixes with `accuracy_m`
    pub fn with_satellite_accuracy(accuracy_m: u32) -> Self {
        Self {
            satellite_accuracy_m: accuracy_m,
        }
    }

    pub fn satellite_accuracy_m(&self) -> u32 {
        self.satellite_accuracy_m
    }

    /// Parse a satellite answer:
    /// `+CGPSINFO: <lat>,<N/S>,<lon>,<E/W>,<date>,<UTC time>,<alt>,<speed>,<course>`
    pub fn parse_satellite_fix(&self, raw: &str) -> ParseOutcome {
        let payload = match extract_payload(raw, SATELLITE_MARKER) {
            Ok(payload) => payload,
            Err(e) => return ParseOutcome::Malformed(e),
        };

        let fields: Vec<&str> = payload.split(',').map(str::trim).collect();

        // ",,,,,,,," is what the receiver reports until it has a lock
        if fields.len() > 1 && fields.iter().all(|f| f.is_empty()) {
            return ParseOutcome::NoFix;
        }

        match self.satellite_fields_to_fix(&fields) {
            Ok(fix) => ParseOutcome::Fix(fix),
            Err(e) => ParseOutcome::Malformed(e),
        }
    }

    /// Parse a location service answer:
    /// `+CLBS: <code>,<lat>,<lon>,<radius>[,<date>,<time>]`
    pub fn parse_cell_tower_fix(&self, raw: &str) -> ParseOutcome {
        let result = extract_payload(raw, CELL_TOWER_MARKER).and_then(|payload| {
            let fields: Vec<&str> = payload.split(',').map(str::trim).collect();
            cell_tower_fields_to_fix(&fields)
        });

        match result {
            Ok(fix) => ParseOutcome::Fix(fix),
            Err(e) => ParseOutcome::Malformed(e),
        }
    }

    fn satellite_fields_to_fix(&self, fields: &[&str]) -> Result<Fix, ParseError> {
        if fields.len() < SATELLITE_FIELDS {
            return Err(ParseError::FieldCount {
                expected: SATELLITE_FIELDS,
                found: fields.len(),
            });
        }

        let lat_hemisphere = LatHemisphere::from_indicator(fields[1]).ok_or_else(|| {
            ParseError::InvalidField { field: "latitude hemisphere", value: fields[1].to_string() }
        })?;
        let lon_hemisphere = LonHemisphere::from_indicator(fields[3]).ok_or_else(|| {
            ParseError::InvalidField { field: "longitude hemisphere", value: fields[3].to_string() }
        })?;

        let latitude = sentence_to_degrees(parse_magnitude("latitude", fields[0])?) * lat_hemisphere.sign();
        let longitude = sentence_to_degrees(parse_magnitude("longitude", fields[2])?) * lon_hemisphere.sign();

        let timestamp = format!("{}_{}", fields[4], fields[5]);

        Fix::new(timestamp, latitude, longitude, self.satellite_accuracy_m, FixSource::Satellite)
            .map(|fix| fix.with_hemispheres(Some(lat_hemisphere), Some(lon_hemisphere)))
            .map_err(|e| ParseError::OutOfRange { field: e.field, value: e.value })
    }
}

impl Default for PositionParser {
    fn default() -> Self {
        Self::new()
    }
}

fn cell_tower_fields_to_fix(fields: &[&str]) -> Result<Fix, ParseError> {
    let code: u32 = parse_field("error code", fields[0])?;
    if code != 0 {
        return Err(ParseError::ModemError { code });
    }

    if fields.len() < CELL_TOWER_MIN_FIELDS {
        return Err(ParseError::FieldCount {
            expected: CELL_TOWER_MIN_FIELDS,
            found: fields.len(),
        });
    }

    let latitude: f64 = parse_field("latitude", fields[1])?;
    let longitude: f64 = parse_field("longitude", fields[2])?;
    let radius: u32 = parse_field("accuracy radius", fields[3])?;

    let timestamp = if fields.len() >= 6 {
        format!("{}_{}", fields[4], fields[5]).replace('/', "_")
    } else {
        String::new()
    };

    Fix::new(timestamp, latitude, longitude, radius, FixSource::CellTower)
        .map_err(|e| ParseError::OutOfRange { field: e.field, value: e.value })
}

/// First line following `marker`, trimmed
fn extract_payload<'a>(raw: &'a str, marker: &'static str) -> Result<&'a str, ParseError> {
    let start = raw
        .find(marker)
        .ok_or(ParseError::MissingMarker { marker })?;
    let rest = &raw[start + marker.len()..];
    let line = rest.split(['\r', '\n']).next().unwrap_or_default();
    Ok(line.trim())
}

fn parse_field<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidField {
        field,
        value: value.to_string(),
    })
}

/// Packed sentence values are unsigned with a minutes part below 60; the
/// hemisphere carries the sign
fn parse_magnitude(field: &'static str, value: &str) -> Result<f64, ParseError> {
    let magnitude: f64 = parse_field(field, value)?;
    if !magnitude.is_finite() || magnitude < 0.0 || magnitude % 100.0 >= 60.0 {
        return Err(ParseError::InvalidField { field, value: value.to_string() });
    }
    Ok(magnitude)
}
