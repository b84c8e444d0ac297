//! Core types and constants for modem positioning

pub mod types;
pub mod constants;
pub mod fix;

pub use types::*;
pub use constants::*;
pub use fix::{Fix, UncertaintyDisc, great_circle_distance};
