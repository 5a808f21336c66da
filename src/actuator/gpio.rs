use super::{Actuator, ActuatorError};
use rppal::gpio::{Gpio, OutputPin};
use tracing::debug;

/// Actuator backed by a GPIO output pin.
///
/// The pin is configured once on construction. Pull resistors are left
/// disabled, which is the rppal default for output pins.
pub struct GpioActuator {
    pin: OutputPin,
    active_low: bool,
    on: bool,
}

impl GpioActuator {
    pub fn new(pin: u8, active_low: bool) -> Result<Self, ActuatorError> {
        let gpio = Gpio::new()?;
        let pin = gpio.get(pin)?.into_output();

        let mut actuator = Self {
            pin,
            active_low,
            on: false,
        };
        actuator.set(false);
        Ok(actuator)
    }
}

impl Actuator for GpioActuator {
    fn set(&mut self, on: bool) {
        // active_low inverts the electrical level
        if on != self.active_low {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        self.on = on;
        debug!("GPIO {} switched {}", self.pin.pin(), if on { "on" } else { "off" });
    }

    fn is_on(&self) -> bool {
        self.on
    }
}
