//! Common API types and data structures

use crate::core::Fix;
use crate::geofence::{GeometryError, ZoneError};
use crate::hardware::ChannelError;
use crate::utils::config::ConfigError;
use std::fmt;

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// API error types
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Hardware communication error
    Channel(ChannelError),
    /// Zone could not be loaded
    Zone(ZoneError),
    /// Fix geometry could not be brought into the zone's CRS
    Geometry(GeometryError),
    /// Invalid configuration
    Configuration(ConfigError),
    /// The modem did not confirm a control command
    CommandRejected { command: String, response: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Channel(e) => write!(f, "Channel error: {}", e),
            ApiError::Zone(e) => write!(f, "Zone error: {}", e),
            ApiError::Geometry(e) => write!(f, "Geometry error: {}", e),
            ApiError::Configuration(e) => write!(f, "Configuration error: {}", e),
            ApiError::CommandRejected { command, response } => {
                write!(f, "Modem did not confirm {}: {:?}", command, response)
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ChannelError> for ApiError {
    fn from(error: ChannelError) -> Self {
        ApiError::Channel(error)
    }
}

impl From<ZoneError> for ApiError {
    fn from(error: ZoneError) -> Self {
        ApiError::Zone(error)
    }
}

impl From<GeometryError> for ApiError {
    fn from(error: GeometryError) -> Self {
        ApiError::Geometry(error)
    }
}

impl From<ConfigError> for ApiError {
    fn from(error: ConfigError) -> Self {
        ApiError::Configuration(error)
    }
}

/// Running counters for a positioning session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemState {
    /// Positioning requests issued
    pub requests: u32,
    pub satellite_fixes: u32,
    pub cell_tower_fixes: u32,
    /// Requests that ended without any fix
    pub no_fix_count: u32,
    /// Channel errors surfaced to the caller
    pub error_count: u32,
    pub last_fix: Option<Fix>,
}
