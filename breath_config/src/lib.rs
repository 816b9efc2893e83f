#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the breathing-guidance system.
//!
//! All structs are deserialized from TOML and checked by `validate()`
//! before any hardware or control state is built. Validation failures are
//! reported as `eyre` errors with the offending key in the message.
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Pins {
    /// L298N IN1 (extend)
    pub in1: u8,
    /// L298N IN2 (retract)
    pub in2: u8,
    /// L298N ENA; driven high (full speed)
    pub enable: u8,
    /// I2C bus index for the BMP280
    pub i2c_bus: u8,
    /// BMP280 I2C address (0x76 or 0x77)
    pub bmp280_addr: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            in1: 23,
            in2: 24,
            enable: 25,
            i2c_bus: 1,
            bmp280_addr: 0x76,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct FilterCfg {
    /// Butterworth order; must be even, 2..=8
    pub order: usize,
    /// Low-pass cutoff in Hz; must sit below Nyquist
    pub cutoff_hz: f64,
    /// Control loop and sampling rate in Hz
    pub sample_rate_hz: u32,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self {
            order: 4,
            cutoff_hz: 2.0,
            sample_rate_hz: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SessionCfg {
    /// Warmup phase length in seconds (filter settling)
    pub warmup_s: f64,
    /// Mirror/calibration phase length in seconds
    pub mirror_s: f64,
    /// Target period when Mirror collects no breaths
    pub fallback_target_s: f64,
    /// Shortest plausible breath in Guide phase
    pub min_breath_guide_s: f64,
    /// Shortest plausible breath in Mirror phase
    pub min_breath_mirror_s: f64,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            warmup_s: 5.0,
            mirror_s: 60.0,
            fallback_target_s: 4.0,
            min_breath_guide_s: 0.5,
            min_breath_mirror_s: 0.8,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct AdaptiveCfg {
    /// Breaths evaluated per verdict
    pub sampling_window: usize,
    /// All deviations within this % => Success
    pub success_threshold_pct: f64,
    /// Any deviation beyond this % => Fail
    pub fail_threshold_pct: f64,
    /// Added to the target period on Success
    pub increase_breath_s: f64,
}

impl Default for AdaptiveCfg {
    fn default() -> Self {
        Self {
            sampling_window: 4,
            success_threshold_pct: 15.0,
            fail_threshold_pct: 50.0,
            increase_breath_s: 0.5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ActuatorCfg {
    /// Position counter ceiling (ticks of travel)
    pub max_distance: i32,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self { max_distance: 50 }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Timeouts {
    /// Max sensor wait per read (ms)
    pub sensor_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { sensor_ms: 150 }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerCfg {
    /// Listen address for the display relay, host:port
    pub bind: String,
}

impl Default for ServerCfg {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5005".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub pins: Pins,
    pub filter: FilterCfg,
    pub session: SessionCfg,
    pub adaptive: AdaptiveCfg,
    pub actuator: ActuatorCfg,
    pub timeouts: Timeouts,
    pub logging: Logging,
    pub server: ServerCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Filter
        if self.filter.order == 0 || self.filter.order % 2 != 0 || self.filter.order > 8 {
            eyre::bail!("filter.order must be even and in 2..=8");
        }
        if self.filter.sample_rate_hz == 0 {
            eyre::bail!("filter.sample_rate_hz must be > 0");
        }
        let nyquist = f64::from(self.filter.sample_rate_hz) / 2.0;
        if !(self.filter.cutoff_hz > 0.0 && self.filter.cutoff_hz < nyquist) {
            eyre::bail!("filter.cutoff_hz must be in (0, sample_rate_hz/2)");
        }

        // Session
        if self.session.warmup_s < 0.0 {
            eyre::bail!("session.warmup_s must be >= 0");
        }
        if self.session.mirror_s < 0.0 {
            eyre::bail!("session.mirror_s must be >= 0");
        }
        if self.session.fallback_target_s <= 0.0 {
            eyre::bail!("session.fallback_target_s must be > 0");
        }
        if self.session.min_breath_guide_s < 0.0 || self.session.min_breath_mirror_s < 0.0 {
            eyre::bail!("session.min_breath_*_s must be >= 0");
        }

        // Adaptive
        if self.adaptive.sampling_window == 0 {
            eyre::bail!("adaptive.sampling_window must be >= 1");
        }
        if self.adaptive.success_threshold_pct < 0.0 {
            eyre::bail!("adaptive.success_threshold_pct must be >= 0");
        }
        if self.adaptive.fail_threshold_pct < self.adaptive.success_threshold_pct {
            eyre::bail!("adaptive.fail_threshold_pct must be >= success_threshold_pct");
        }
        if self.adaptive.increase_breath_s <= 0.0 {
            eyre::bail!("adaptive.increase_breath_s must be > 0");
        }

        // Actuator
        if self.actuator.max_distance <= 0 {
            eyre::bail!("actuator.max_distance must be > 0");
        }

        // Pins
        if self.pins.in1 == self.pins.in2 || self.pins.in1 == self.pins.enable {
            eyre::bail!("pins.in1/in2/enable must be distinct");
        }
        if self.pins.bmp280_addr != 0x76 && self.pins.bmp280_addr != 0x77 {
            eyre::bail!("pins.bmp280_addr must be 0x76 or 0x77");
        }

        // Timeouts
        if self.timeouts.sensor_ms == 0 {
            eyre::bail!("timeouts.sensor_ms must be >= 1");
        }

        // Server
        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            eyre::bail!("server.bind must be a valid host:port address");
        }

        Ok(())
    }
}
