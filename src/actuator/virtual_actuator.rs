use super::Actuator;
use tracing::info;

/// In-memory actuator. Records how often it was written so callers can tell a
/// repeated command apart from an untouched output.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VirtualActuator {
    on: bool,
    writes: usize,
}

impl VirtualActuator {
    /// Number of `set` calls since construction
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Actuator for VirtualActuator {
    fn set(&mut self, on: bool) {
        self.on = on;
        self.writes += 1;
        info!("Virtual actuator switched {}", if on { "on" } else { "off" });
    }

    fn is_on(&self) -> bool {
        self.on
    }
}
