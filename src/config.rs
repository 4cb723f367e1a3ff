//! Node configuration parameters
//!
//! Static tunables read once at start-up from a JSON file.  The control
//! parameters that operators change at runtime live in the parameter store,
//! not here.

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::device::PingRate;
use crate::error::ConfigError;

/// Core node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    // --- Publication ---
    /// Frame id stamped on published telemetry
    pub frame_id: String,
    /// Run flag used when the parameter store holds none
    pub run: bool,

    // --- Thermal ---
    /// Advisory temperature (Celsius); logs a warning only
    pub temperature_warn_c: f64,
    /// Stop temperature (Celsius); at or above, the sonar is put in standby
    pub temperature_stop_c: f64,

    // --- Device ---
    /// Ping-rate code meaning "do not ping"
    pub standby_ping_rate: u8,
    /// Poll period while waiting for the device link (milliseconds)
    pub connect_retry_ms: u64,
    /// Poll attempts before start-up gives up
    pub connect_attempts: u32,

    // --- Diagnostics ---
    /// Sustained rate of flag-invariant diagnostics (per second)
    pub flag_diag_per_sec: u64,
    /// Burst of flag-invariant diagnostics allowed before throttling
    pub flag_diag_burst: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            frame_id: "sonar".to_owned(),
            run: false,

            temperature_warn_c: 30.0,
            temperature_stop_c: 35.0,

            standby_ping_rate: PingRate::Standby.code(),
            connect_retry_ms: 1000,
            connect_attempts: 30,

            flag_diag_per_sec: 1,
            flag_diag_burst: 3,
        }
    }
}

impl NodeConfig {
    /// Range-check every field.  Invalid values are rejected, not clamped:
    /// a bad stop threshold would silently disable the thermal interlock.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_id.is_empty() {
            return Err(ConfigError::ValidationFailed("frame_id must not be empty"));
        }
        if !(0.0..=120.0).contains(&self.temperature_stop_c) {
            return Err(ConfigError::ValidationFailed(
                "temperature_stop_c must be 0.0–120.0",
            ));
        }
        if self.temperature_warn_c >= self.temperature_stop_c {
            return Err(ConfigError::ValidationFailed(
                "temperature_warn_c must be < temperature_stop_c",
            ));
        }
        if PingRate::from_code(self.standby_ping_rate).is_none() {
            return Err(ConfigError::ValidationFailed(
                "standby_ping_rate must be a ping-rate code (0–5)",
            ));
        }
        if self.connect_retry_ms == 0 || self.connect_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "connect_retry_ms and connect_attempts must be > 0",
            ));
        }
        if self.flag_diag_per_sec == 0 || self.flag_diag_burst == 0 {
            return Err(ConfigError::ValidationFailed(
                "flag_diag_per_sec and flag_diag_burst must be > 0",
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(text).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let cfg = Self::from_json(&text)?;
                info!("NodeConfig: loaded {}", path.display());
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("NodeConfig: {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(_) => Err(ConfigError::IoError),
        }
    }
}
