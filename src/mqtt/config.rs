use crate::config::DEVICE_ID;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_PORT: u16 = 1883;
const SCHEMES: [&str; 2] = ["mqtt://", "tcp://"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerUrlError {
    #[error("Broker url '{0}' has no host")]
    MissingHost(String),

    #[error("Broker url '{url}' has an invalid port '{port}'")]
    InvalidPort { url: String, port: String },
}

/// Message published once after every successful connect.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Announce {
    pub topic: String,
    pub payload: String,
    #[serde(default)]
    pub retain: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MqttConfig {
    /// `mqtt://host:port`, scheme and port are optional
    pub broker_url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// Capacity of the client request queue
    pub channel_capacity: usize,
    /// Pause before polling again after a transport error
    pub reconnect_delay_ms: u64,
    pub announce: Option<Announce>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_url: "mqtt://192.168.43.16:1883".to_string(),
            user: None,
            password: None,
            client_id: format!("siot-{}", DEVICE_ID),
            keep_alive_secs: 5,
            channel_capacity: 100,
            reconnect_delay_ms: 2000,
            announce: None,
        }
    }
}

impl MqttConfig {
    /// Splits the broker url into host and port.
    pub fn broker_address(&self) -> Result<(String, u16), BrokerUrlError> {
        let url = self.broker_url.trim();
        let address = SCHEMES
            .iter()
            .find_map(|scheme| url.strip_prefix(scheme))
            .unwrap_or(url)
            .trim_end_matches('/');

        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse().map_err(|_| BrokerUrlError::InvalidPort {
                    url: self.broker_url.clone(),
                    port: port.to_string(),
                })?;
                (host, port)
            }
            None => (address, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(BrokerUrlError::MissingHost(self.broker_url.clone()));
        }

        Ok((host.to_string(), port))
    }
}
