//! Blocking positioning API
//!
//! One façade over the command channel: session control (open, ping, echo,
//! reset), positioning with fallback, and the geofence check.

pub mod blocking;
pub mod types;

pub use blocking::PositioningApi;
pub use types::{ApiError, ApiResult, SystemState};
