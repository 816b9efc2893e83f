//! Common time/period helpers for breath_core.

use std::time::Duration;

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Compute the period in microseconds for a given sampling rate in Hz.
/// - Clamps `hz` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 microsecond.
#[inline]
pub fn period_us(hz: u32) -> u64 {
    (MICROS_PER_SEC / u64::from(hz.max(1))).max(1)
}

/// Loop period as a `Duration` for a given sampling rate in Hz.
#[inline]
pub fn period(hz: u32) -> Duration {
    Duration::from_micros(period_us(hz))
}

/// Sample interval in seconds for a given sampling rate in Hz.
#[inline]
pub fn sample_interval_s(hz: u32) -> f64 {
    1.0 / f64::from(hz.max(1))
}

/// Arithmetic mean; `None` on an empty slice so callers are forced to
/// supply a fallback instead of dividing by zero.
#[inline]
pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().sum::<f64>() / xs.len() as f64)
}
