//! Binary actuator abstraction
//!
//! The command dispatcher only needs to switch a single output on or off. The
//! [`Actuator`] trait captures exactly that, so the dispatcher can be driven by
//! real hardware ([`gpio::GpioActuator`]) or by an in-memory stand-in
//! ([`virtual_actuator::VirtualActuator`]) on machines without GPIO.
//!
//! ```text
//! DeviceConfig.actuator ──► from_config ──► Box<dyn Actuator>
//!                                            ├── GpioActuator      (rppal)
//!                                            └── VirtualActuator   (log only)
//! ```

pub mod gpio;
pub mod virtual_actuator;

pub use gpio::GpioActuator;
pub use virtual_actuator::VirtualActuator;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),
}

/// A single binary output.
///
/// `set` is level based: applying the same state twice leaves the output in
/// that state.
pub trait Actuator {
    fn set(&mut self, on: bool);

    fn is_on(&self) -> bool;
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn set(&mut self, on: bool) {
        (**self).set(on)
    }

    fn is_on(&self) -> bool {
        (**self).is_on()
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorBackend {
    /// Drive a GPIO pin through rppal
    #[default]
    Gpio,
    /// Keep the state in memory, for hosts without GPIO
    Virtual,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ActuatorConfig {
    pub backend: ActuatorBackend,
    /// BCM pin number
    pub pin: u8,
    /// Output is lit when the pin is driven low
    pub active_low: bool,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            backend: ActuatorBackend::Gpio,
            pin: 2,
            active_low: false,
        }
    }
}

/// Builds the configured actuator. The output starts switched off.
pub fn from_config(config: &ActuatorConfig) -> Result<Box<dyn Actuator>, ActuatorError> {
    match config.backend {
        ActuatorBackend::Gpio => {
            info!(
                "Configuring GPIO {} as actuator output (active_low: {})",
                config.pin, config.active_low
            );
            Ok(Box::new(GpioActuator::new(config.pin, config.active_low)?))
        }
        ActuatorBackend::Virtual => {
            info!("Using virtual actuator, no GPIO will be driven");
            Ok(Box::new(VirtualActuator::default()))
        }
    }
}
