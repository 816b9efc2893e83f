pub mod error;

#[cfg(feature = "hardware")]
pub mod bmp280;

use breath_traits::{Actuator, Direction, PressureSensor};

/// Simulated chest sensor: a slow sinusoidal breathing trace riding on a
/// standard-atmosphere baseline, with a whisper of deterministic noise so
/// filters and edge detection have something honest to chew on.
pub struct SimulatedPressureSensor {
    baseline_hpa: f64,
    amplitude_hpa: f64,
    breath_period_s: f64,
    sample_rate_hz: f64,
    tick: u64,
    rng_state: u32,
}

impl SimulatedPressureSensor {
    pub fn new(breath_period_s: f64, sample_rate_hz: u32) -> Self {
        Self {
            baseline_hpa: 1013.25,
            amplitude_hpa: 0.12,
            breath_period_s: breath_period_s.max(0.5),
            sample_rate_hz: f64::from(sample_rate_hz.max(1)),
            tick: 0,
            rng_state: 0x1234_5678,
        }
    }

    // xorshift32; tiny and deterministic
    fn noise(&mut self) -> f64 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng_state = x;
        (f64::from(x) / f64::from(u32::MAX) - 0.5) * 2.0
    }
}

impl Default for SimulatedPressureSensor {
    fn default() -> Self {
        Self::new(4.0, 60)
    }
}

impl PressureSensor for SimulatedPressureSensor {
    fn read(
        &mut self,
        _timeout: std::time::Duration,
    ) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        let t = self.tick as f64 / self.sample_rate_hz;
        self.tick += 1;
        let phase = 2.0 * std::f64::consts::PI * t / self.breath_period_s;
        let noise = self.noise() * 0.005;
        Ok(self.baseline_hpa + self.amplitude_hpa * phase.sin() + noise)
    }
}

/// Simulated actuator: tracks the commanded direction and an estimated
/// carriage position, logging transitions.
#[derive(Debug, Default)]
pub struct SimulatedActuator {
    last: Option<Direction>,
    transitions: u64,
}

impl SimulatedActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }
}

impl Actuator for SimulatedActuator {
    fn set_direction(
        &mut self,
        direction: Direction,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.last != Some(direction) {
            tracing::debug!(?direction, "actuator direction (simulated)");
            self.transitions += 1;
            self.last = Some(direction);
        }
        Ok(())
    }
}

#[cfg(feature = "hardware")]
pub struct HardwarePressureSensor {
    bmp280: bmp280::Bmp280,
}

#[cfg(feature = "hardware")]
impl HardwarePressureSensor {
    pub fn new(bus: u8, addr: u8) -> Result<Self, error::HwError> {
        let bmp280 = bmp280::Bmp280::new(bus, addr)?;
        Ok(Self { bmp280 })
    }
}

#[cfg(feature = "hardware")]
impl PressureSensor for HardwarePressureSensor {
    fn read(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        let mut attempts = 0;
        let max_attempts = 3;
        loop {
            match self.bmp280.read_with_timeout(timeout) {
                Ok(hpa) => {
                    tracing::debug!(hpa, "bmp280 sample");
                    return Ok(hpa);
                }
                Err(error::HwError::Timeout) if attempts < max_attempts => {
                    attempts += 1;
                    tracing::warn!(retries = attempts, "sensor timeout, retrying");
                }
                Err(e) => {
                    tracing::error!("sensor read error: {}", e);
                    return Err(Box::new(e));
                }
            }
        }
    }
}

#[cfg(feature = "hardware")]
pub struct HardwareActuator {
    driver: l298n::L298n,
}

#[cfg(feature = "hardware")]
impl HardwareActuator {
    pub fn new(in1_pin: u8, in2_pin: u8, enable_pin: u8) -> Result<Self, error::HwError> {
        Ok(Self {
            driver: l298n::L298n::new(in1_pin, in2_pin, enable_pin)?,
        })
    }
}

#[cfg(feature = "hardware")]
impl Actuator for HardwareActuator {
    fn set_direction(
        &mut self,
        direction: Direction,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.driver.drive(direction);
        Ok(())
    }
}

#[cfg(feature = "hardware")]
mod l298n {
    use breath_traits::Direction;
    use rppal::gpio::{Gpio, OutputPin};

    use crate::error::HwError;

    /// L298N H-bridge wired to the linear actuator: two direction inputs
    /// plus an enable pin held high (the original firmware ran its enable
    /// PWM at 100% duty).
    pub struct L298n {
        in1: OutputPin,
        in2: OutputPin,
        enable: OutputPin,
    }

    impl L298n {
        pub fn new(in1_pin: u8, in2_pin: u8, enable_pin: u8) -> Result<Self, HwError> {
            let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
            let in1 = gpio
                .get(in1_pin)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_output_low();
            let in2 = gpio
                .get(in2_pin)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_output_low();
            let mut enable = gpio
                .get(enable_pin)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_output_low();
            enable.set_high();
            Ok(Self { in1, in2, enable })
        }

        pub fn drive(&mut self, direction: Direction) {
            match direction {
                Direction::Extend => {
                    self.in1.set_high();
                    self.in2.set_low();
                }
                Direction::Retract => {
                    self.in1.set_low();
                    self.in2.set_high();
                }
                Direction::Stop => {
                    self.in1.set_low();
                    self.in2.set_low();
                }
            }
        }
    }

    impl Drop for L298n {
        fn drop(&mut self) {
            // Release the carriage whatever else happens.
            self.in1.set_low();
            self.in2.set_low();
            self.enable.set_low();
        }
    }
}
