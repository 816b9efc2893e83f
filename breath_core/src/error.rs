use thiserror::Error;

/// Per-tick hardware fault taxonomy. Sensor faults feed the tick-skip
/// policy; actuator faults are logged and swallowed by the loop.
#[derive(Debug, Error, Clone)]
pub enum SessionError {
    #[error("sensor error: {0}")]
    Sensor(String),
    #[error("actuator error: {0}")]
    Actuator(String),
    #[error("timeout waiting for sensor")]
    Timeout,
}

/// Construction-time validation failures. Missing components are ruled out
/// at compile time by the builder's type-state, so only config faults
/// remain representable.
#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
