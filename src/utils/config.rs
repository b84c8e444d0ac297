//! Configuration management
//!
//! Loads and saves the runtime configuration as JSON and validates it
//! before use. Every section carries serde defaults, so a partial file only
//! needs the values it changes.

use crate::core::constants::{DEFAULT_SATELLITE_ACCURACY_M, DEFAULT_ZONE_MARGIN_M};
use crate::hardware::SerialConfig;
use crate::processing::{FallbackConfig, TransactionConfig};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
    IoError {
        message: String,
    },
    SerializationError {
        message: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidParameter { parameter, value, reason } => {
                write!(f, "Invalid parameter '{}' = '{}': {}", parameter, value, reason)
            }
            ConfigError::IoError { message } => {
                write!(f, "I/O error: {}", message)
            }
            ConfigError::SerializationError { message } => {
                write!(f, "Serialization error: {}", message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Accuracy assigned to fixes that carry no radius of their own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccuracyConfig {
    pub satellite_accuracy_m: u32,
}

impl Default for AccuracyConfig {
    fn default() -> Self {
        Self {
            satellite_accuracy_m: DEFAULT_SATELLITE_ACCURACY_M,
        }
    }
}

/// Zone file and its tolerance margin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Zone document to load at startup, if any
    pub path: Option<String>,
    /// Buffer applied to every zone polygon (meters)
    pub margin_m: f64,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            path: None,
            margin_m: DEFAULT_ZONE_MARGIN_M,
        }
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub serial: SerialConfig,
    pub transaction: TransactionConfig,
    pub fallback: FallbackConfig,
    pub accuracy: AccuracyConfig,
    pub zone: ZoneConfig,
    /// Delay between positioning requests in the polling loop (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            transaction: TransactionConfig::default(),
            fallback: FallbackConfig::default(),
            accuracy: AccuracyConfig::default(),
            zone: ZoneConfig::default(),
            poll_interval_ms: 3000,
        }
    }
}

/// Validation result with errors and warnings
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ConfigError>,
    pub warnings: Vec<String>,
}

/// Owns the active configuration and its backing file
#[derive(Debug)]
pub struct ConfigurationManager {
    system_config: SystemConfig,
    config_file_path: Option<PathBuf>,
    is_modified: bool,
}

impl ConfigurationManager {
    /// Create a manager holding the default configuration
    pub fn new() -> Self {
        Self {
            system_config: SystemConfig::default(),
            config_file_path: None,
            is_modified: false,
        }
    }

    /// Create a manager and load configuration from `path`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut manager = Self::new();
        manager.load_from_file(path)?;
        Ok(manager)
    }

    pub fn get_system_config(&self) -> &SystemConfig {
        &self.system_config
    }

    /// Replace the configuration after validating it
    pub fn update_system_config(&mut self, config: SystemConfig) -> Result<(), ConfigError> {
        let validation = self.validate_system_config(&config);
        if let Some(error) = validation.errors.into_iter().next() {
            return Err(error);
        }
        for warning in &validation.warnings {
            warn!("Configuration warning: {}", warning);
        }

        self.system_config = config;
        self.is_modified = true;
        Ok(())
    }

    /// Load configuration from a JSON file
    ///
    /// The file is rejected, and the current configuration kept, when
    /// validation reports any error.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;

        let config: SystemConfig = serde_json::from_str(&content).map_err(|e| ConfigError::SerializationError {
            message: format!("Failed to parse {}: {}", path.display(), e),
        })?;

        self.update_system_config(config)?;
        self.config_file_path = Some(path.to_path_buf());
        self.is_modified = false;
        info!("Loaded configuration from {}", path.display());
        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(&self.system_config).map_err(|e| ConfigError::SerializationError {
            message: e.to_string(),
        })?;

        fs::write(path, content).map_err(|e| ConfigError::IoError {
            message: format!("Failed to write {}: {}", path.display(), e),
        })?;

        self.config_file_path = Some(path.to_path_buf());
        self.is_modified = false;
        debug!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Save to the file the configuration was last loaded from or saved to
    pub fn save(&mut self) -> Result<(), ConfigError> {
        match self.config_file_path.clone() {
            Some(path) => self.save_to_file(path),
            None => Err(ConfigError::IoError {
                message: "No configuration file path set".to_string(),
            }),
        }
    }

    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    pub fn config_file_path(&self) -> Option<&Path> {
        self.config_file_path.as_deref()
    }

    // Runtime Parameter Adjustment Methods

    /// Update the zone margin, returning the previous value
    pub fn set_zone_margin(&mut self, margin_m: f64) -> Result<f64, ConfigError> {
        let old_value = self.system_config.zone.margin_m;
        check_zone_margin(margin_m)?;

        self.system_config.zone.margin_m = margin_m;
        self.is_modified = true;
        Ok(old_value)
    }

    /// Update the command timeout, returning the previous value
    pub fn set_command_timeout(&mut self, timeout_ms: u64) -> Result<u64, ConfigError> {
        let old_value = self.system_config.transaction.command_timeout_ms;
        check_command_timeout(timeout_ms)?;

        self.system_config.transaction.command_timeout_ms = timeout_ms;
        self.is_modified = true;
        Ok(old_value)
    }

    /// Update the satellite fix accuracy, returning the previous value
    pub fn set_satellite_accuracy(&mut self, accuracy_m: u32) -> Result<u32, ConfigError> {
        let old_value = self.system_config.accuracy.satellite_accuracy_m;
        if accuracy_m > MAX_ACCURACY_M {
            return Err(ConfigError::InvalidParameter {
                parameter: "satellite_accuracy_m".to_string(),
                value: accuracy_m.to_string(),
                reason: format!("Satellite accuracy must not exceed {}m", MAX_ACCURACY_M),
            });
        }

        self.system_config.accuracy.satellite_accuracy_m = accuracy_m;
        self.is_modified = true;
        Ok(old_value)
    }

    /// Check a configuration without applying it
    pub fn validate_system_config(&self, config: &SystemConfig) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if let Err(e) = config.serial.validate() {
            errors.push(ConfigError::InvalidParameter {
                parameter: "serial".to_string(),
                value: config.serial.port_name.clone(),
                reason: e.to_string(),
            });
        }

        if let Err(e) = check_command_timeout(config.transaction.command_timeout_ms) {
            errors.push(e);
        }

        if config.transaction.poll_interval_ms == 0 {
            errors.push(ConfigError::InvalidParameter {
                parameter: "transaction.poll_interval_ms".to_string(),
                value: "0".to_string(),
                reason: "Read poll interval must be positive".to_string(),
            });
        } else if config.transaction.poll_interval_ms >= config.transaction.command_timeout_ms {
            errors.push(ConfigError::InvalidParameter {
                parameter: "transaction.poll_interval_ms".to_string(),
                value: config.transaction.poll_interval_ms.to_string(),
                reason: "Read poll interval must be shorter than the command timeout".to_string(),
            });
        }

        if config.fallback.max_satellite_attempts == 0 {
            warnings.push("Satellite positioning disabled, every fix will come from the cell tower".to_string());
        } else if config.fallback.max_satellite_attempts > 10 {
            warnings.push("Many satellite attempts delay the cell-tower fallback".to_string());
        }

        if config.accuracy.satellite_accuracy_m > MAX_ACCURACY_M {
            errors.push(ConfigError::InvalidParameter {
                parameter: "accuracy.satellite_accuracy_m".to_string(),
                value: config.accuracy.satellite_accuracy_m.to_string(),
                reason: format!("Satellite accuracy must not exceed {}m", MAX_ACCURACY_M),
            });
        } else if config.accuracy.satellite_accuracy_m == 0 {
            warnings.push("Zero satellite accuracy treats fixes as exact points".to_string());
        }

        if let Err(e) = check_zone_margin(config.zone.margin_m) {
            errors.push(e);
        }

        if let Some(path) = &config.zone.path {
            if path.trim().is_empty() {
                errors.push(ConfigError::InvalidParameter {
                    parameter: "zone.path".to_string(),
                    value: format!("{:?}", path),
                    reason: "Zone path must not be empty".to_string(),
                });
            }
        }

        if config.poll_interval_ms < 100 {
            errors.push(ConfigError::InvalidParameter {
                parameter: "poll_interval_ms".to_string(),
                value: config.poll_interval_ms.to_string(),
                reason: "Polling interval must be at least 100ms".to_string(),
            });
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

impl Default for ConfigurationManager {
    fn default() -> Self {
        Self::new()
    }
}

const MAX_ACCURACY_M: u32 = 100_000;
const MAX_ZONE_MARGIN_M: f64 = 10_000.0;

fn check_command_timeout(timeout_ms: u64) -> Result<(), ConfigError> {
    if !(100..=60_000).contains(&timeout_ms) {
        return Err(ConfigError::InvalidParameter {
            parameter: "transaction.command_timeout_ms".to_string(),
            value: timeout_ms.to_string(),
            reason: "Command timeout must be between 100 and 60000 ms".to_string(),
        });
    }
    Ok(())
}

fn check_zone_margin(margin_m: f64) -> Result<(), ConfigError> {
    if !margin_m.is_finite() || margin_m < 0.0 || margin_m > MAX_ZONE_MARGIN_M {
        return Err(ConfigError::InvalidParameter {
            parameter: "zone.margin_m".to_string(),
            value: margin_m.to_string(),
            reason: format!("Zone margin must be between 0 and {}m", MAX_ZONE_MARGIN_M),
        });
    }
    Ok(())
}
