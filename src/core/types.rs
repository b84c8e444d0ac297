//! Core data types for modem positioning

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which positioning service produced a fix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixSource {
    /// GNSS receiver on the modem
    Satellite,
    /// Serving base station location (LBS)
    CellTower,
}

/// Latitude hemisphere indicator as reported by the modem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatHemisphere {
    N,
    S,
}

/// Longitude hemisphere indicator as reported by the modem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LonHemisphere {
    E,
    W,
}

impl LatHemisphere {
    pub fn from_indicator(indicator: &str) -> Option<Self> {
        match indicator.trim() {
            "N" | "n" => Some(LatHemisphere::N),
            "S" | "s" => Some(LatHemisphere::S),
            _ => None,
        }
    }

    /// Sign applied to an unsigned magnitude in this hemisphere
    pub fn sign(self) -> f64 {
        match self {
            LatHemisphere::N => 1.0,
            LatHemisphere::S => -1.0,
        }
    }
}

impl LonHemisphere {
    pub fn from_indicator(indicator: &str) -> Option<Self> {
        match indicator.trim() {
            "E" | "e" => Some(LonHemisphere::E),
            "W" | "w" => Some(LonHemisphere::W),
            _ => None,
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            LonHemisphere::E => 1.0,
            LonHemisphere::W => -1.0,
        }
    }
}

impl fmt::Display for LatHemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LatHemisphere::N => write!(f, "N"),
            LatHemisphere::S => write!(f, "S"),
        }
    }
}

impl fmt::Display for LonHemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LonHemisphere::E => write!(f, "E"),
            LonHemisphere::W => write!(f, "W"),
        }
    }
}

/// A coordinate that violates the WGS84 value ranges
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateError {
    pub field: &'static str,
    pub value: f64,
}

impl fmt::Display for CoordinateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} out of range: {}", self.field, self.value)
    }
}

impl std::error::Error for CoordinateError {}
