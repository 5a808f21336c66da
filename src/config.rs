//! # Device Configuration
//!
//! The device identity and the topic layout are compiled into the binary. They
//! define who is allowed to drive the actuator and are deliberately not part of
//! any file that could be edited on the device.
//!
//! Everything that depends on where the device is deployed (broker address,
//! credentials, GPIO wiring) lives in [`DeviceConfig`], which is read from a
//! TOML file. A missing file is not an error: the device falls back to the
//! built-in defaults so a freshly flashed unit still comes up.

use crate::actuator::ActuatorConfig;
use crate::mqtt::config::MqttConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Identifier of this device. Only commands claiming this id are applied.
pub const DEVICE_ID: &str = "99101608";

/// First segment of every command and reply topic.
pub const TOPIC_NAMESPACE: &str = "SIOT";

/// Name of the single actuator, used as the command verb segment.
pub const ACTUATOR_NAME: &str = "LED";

/// Upper bound for inbound topics. Longer topics are dropped unparsed.
pub const MAX_TOPIC_LEN: usize = 128;

/// Upper bound for inbound command payloads.
pub const MAX_PAYLOAD_LEN: usize = 64;

const CONFIG_ENV: &str = "SIOT_ACTUATOR_CONFIG";
const CONFIG_DIR: &str = "siot-actuator";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Deployment settings of the device.
///
/// Every section has defaults, so a file only needs to contain the values that
/// differ from them:
///
/// ```toml
/// [mqtt]
/// broker_url = "mqtt://10.0.0.5:1883"
///
/// [actuator]
/// backend = "gpio"
/// pin = 17
/// ```
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Broker connection settings
    pub mqtt: MqttConfig,
    /// Actuator backend and wiring
    pub actuator: ActuatorConfig,
}

impl DeviceConfig {
    /// Location of the settings file.
    ///
    /// `SIOT_ACTUATOR_CONFIG` wins if set, otherwise the file is looked up in the
    /// platform config directory.
    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|mut path| {
            path.push(CONFIG_DIR);
            path.push(CONFIG_FILE);
            path
        })
    }

    /// Loads the settings from [`DeviceConfig::config_path`].
    pub async fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path).await,
            None => {
                info!("No config directory available, using default device settings");
                Ok(Self::default())
            }
        }
    }

    /// Loads the settings from `path`, falling back to defaults if the file does not exist.
    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        if !exists {
            info!(
                "Config file {} not found, using default device settings",
                path.display()
            );
            return Ok(Self::default());
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Loaded device settings from {}: {:?}", path.display(), config);
        Ok(config)
    }
}
