//! Modem positioning and geofencing
//!
//! Talks to a SIM7600-class cellular modem over its AT command port,
//! acquires a position from the satellite receiver with a cell-tower
//! fallback, and checks the fix against a buffered geographic zone.

pub mod core;
pub mod hardware;
pub mod processing;
pub mod geofence;
pub mod utils;
pub mod api;

// Re-export commonly used types
pub use self::core::{Fix, FixSource, LatHemisphere, LonHemisphere, UncertaintyDisc, great_circle_distance};
pub use hardware::{
    ChannelError, ChannelResult, ChannelStatus, CommandChannel, MockChannel, MockReply, RecoveryStrategy,
    SerialChannel, SerialConfig,
};
pub use processing::{
    Acquisition, AttemptFailure, FallbackConfig, FallbackController, ModemCommand, ParseError, ParseOutcome,
    PositionOutcome, PositionParser, TransactionConfig, TransactionEngine, TransactionResult, TransactionStatus,
};
pub use geofence::{Crs, GeometryEngine, GeometryError, PlanarEngine, PlanarGeometry, Zone, ZoneError};
pub use utils::{ConfigError, ConfigurationManager, SystemConfig};
pub use api::{ApiError, ApiResult, PositioningApi, SystemState};
