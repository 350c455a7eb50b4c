pub mod osc_config;
pub mod target_config;

use std::path::Path;

use anyhow::Result;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::core::bluetooth::{DEFAULT_LINK_POLL_INTERVAL_MS, DEFAULT_SCAN_DURATION_SECS};
use crate::error::ConfigError;
use crate::utils::ensure_directory_exists;

pub use osc_config::{OscBinding, OscConfig};
pub use target_config::TargetConfig;

pub const CONFIG_FILE_NAME: &str = "bridge_config.json";

/// Environment variable naming the config file when no path is given on the command line
pub const CONFIG_PATH_ENV: &str = "BLE_OSC_BRIDGE_CONFIG";

/// Timing of the platform scan and link watchdog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// How long a scan runs before it reports it has finished
    pub timeout_secs: u64,
    /// Interval for checking whether the connected device is still there
    pub link_poll_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_SCAN_DURATION_SECS,
            link_poll_ms: DEFAULT_LINK_POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// One of error, warn, info, debug, trace
    pub level: String,
    /// Emit JSON lines instead of plain text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub target: TargetConfig,
    pub osc: OscConfig,
    pub scan: ScanConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Parses and validates a config document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(json)?;
        config.target.normalize()?;
        config.osc.validate()?;
        Ok(config)
    }

    /// Loads the config from `path`, falling back to defaults when the file is missing.
    pub async fn load_config(path: &Path) -> Result<Self> {
        let file_path_str = path.to_string_lossy().into_owned();

        if !path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path_str);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(path).await?;
        let config = Self::from_json(&config_json)?;

        info!("Config loaded from {:?}", file_path_str);
        Ok(config)
    }

    /// Saves the config to `path`, creating its directory if needed.
    pub async fn save_config(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            ensure_directory_exists(dir).await?;
        }
        let file_path_str = path.to_string_lossy().into_owned();

        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(path, config_json).await?;
        info!("Config saved to {:?}.", file_path_str);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_keeps_defaults() {
        let config = AppConfig::from_json(
            r#"{ "target": { "device_name": "M5StickC" }, "log": { "level": "debug" } }"#,
        )
        .unwrap();

        assert_eq!(config.target.device_name, "M5StickC");
        assert_eq!(config.target.service_uuid, TargetConfig::default().service_uuid);
        assert_eq!(config.osc, OscConfig::default());
        assert_eq!(config.scan.timeout_secs, DEFAULT_SCAN_DURATION_SECS);
        assert_eq!(config.log.level, "debug");
        assert!(!config.log.json);
    }

    #[test]
    fn invalid_binding_is_rejected() {
        let result = AppConfig::from_json(
            r#"{ "osc": { "bindings": [ { "bit": 9, "address": "/input/Run" } ] } }"#,
        );

        assert!(matches!(result, Err(ConfigError::InvalidBit { bit: 9, .. })));
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("ble-osc-bridge-{}", std::process::id()));
        let path = dir.join("nested").join(CONFIG_FILE_NAME);
        let mut config = AppConfig::default();
        config.osc.target = "127.0.0.1:9001".into();

        config.save_config(&path).await.unwrap();
        let loaded = AppConfig::load_config(&path).await.unwrap();
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("ble-osc-bridge-does-not-exist.json");

        assert_eq!(AppConfig::load_config(&path).await.unwrap(), AppConfig::default());
    }
}
