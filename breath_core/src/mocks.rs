//! Test and helper mocks for breath_core

use breath_traits::{Actuator, Direction, PressureSensor};

/// A sensor that always errors on read; useful when driving the session
/// with externally sampled values via `step_from_raw`.
pub struct NoopSensor;

impl PressureSensor for NoopSensor {
    fn read(
        &mut self,
        _timeout: std::time::Duration,
    ) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("noop sensor")))
    }
}

/// An actuator that accepts every command and remembers the last one.
#[derive(Debug, Default)]
pub struct NullActuator {
    pub last_direction: Option<Direction>,
    pub commands: usize,
}

impl Actuator for NullActuator {
    fn set_direction(
        &mut self,
        direction: Direction,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.last_direction = Some(direction);
        self.commands += 1;
        Ok(())
    }
}
