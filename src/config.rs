// src/config.rs
//! Bridge configuration
//!
//! Every value has a deployment default, so the bridge runs without any file.
//! An optional JSON file can override individual fields.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub serial_port: String,
    pub serial_baudrate: u32,
    /// Wait between device acquisition attempts
    pub retry_interval_ms: u64,
    pub service_uuid: String,
    pub service_name: String,
    /// `host:port` probed before starting the correction relay
    pub probe_address: String,
    pub probe_timeout_ms: u64,
    pub relay_program: String,
    pub relay_args: Vec<String>,
    /// How long a fresh relay must survive to count as started
    pub relay_startup_grace_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyUSB0".to_string(),
            serial_baudrate: 38400,
            retry_interval_ms: 5000,
            service_uuid: "94f39d29-7d6d-437d-973b-fba39e49d4ee".to_string(),
            service_name: "GNSS_Server".to_string(),
            probe_address: "www.google.com:80".to_string(),
            probe_timeout_ms: 5000,
            relay_program: "str2str".to_string(),
            relay_args: vec![
                "-in".to_string(),
                "ntrip://<USER>:<PASSWORD>@<IPAddress>:<PORT>/<MOUNTPOINT>".to_string(),
                "-b".to_string(),
                "1".to_string(),
                "-out".to_string(),
                "serial://ttyACM0:38400:8:n:1".to_string(),
            ],
            relay_startup_grace_ms: 3000,
        }
    }
}

impl BridgeConfig {
    /// Load from an explicit path, or from the default location if present
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_path = Self::get_config_path()?;
                if default_path.exists() {
                    Self::load_from_file(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(contents)
            .map_err(|e| BridgeError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.serial_port.is_empty() {
            return Err(BridgeError::Config("serial_port must not be empty".to_string()));
        }
        if self.serial_baudrate == 0 {
            return Err(BridgeError::Config("serial_baudrate must be positive".to_string()));
        }
        if self.relay_program.is_empty() {
            return Err(BridgeError::Config("relay_program must not be empty".to_string()));
        }
        Ok(())
    }

    /// `$HOME/.config/gnss-bridge/config.json`
    fn get_config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| BridgeError::Config("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home).join(".config").join("gnss-bridge").join("config.json"))
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn relay_startup_grace(&self) -> Duration {
        Duration::from_millis(self.relay_startup_grace_ms)
    }
}
