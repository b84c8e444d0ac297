//! Utility modules for configuration

pub mod config;

pub use config::{AccuracyConfig, ConfigError, ConfigurationManager, SystemConfig, ValidationResult, ZoneConfig};
