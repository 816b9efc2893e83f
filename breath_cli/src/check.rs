//! Self-test and carriage-reset routines.

use std::time::Duration;

use breath_traits::{Actuator, Direction, PressureSensor};
use eyre::WrapErr;

use crate::session_run::{RunOverrides, make_hardware};

const EXERCISE_S: u64 = 3;

/// Exercise the sensor and the actuator end to end. Prints a per-item
/// verdict and `OK` when everything passed; returns Err otherwise.
pub fn self_check(cfg: &breath_config::Config) -> eyre::Result<()> {
    let (mut sensor, mut actuator) =
        make_hardware(cfg, &RunOverrides::default()).wrap_err("open hardware")?;

    println!("self-check: sensor...");
    let timeout = Duration::from_millis(cfg.timeouts.sensor_ms);
    let hpa = sensor
        .read(timeout)
        .map_err(|e| eyre::eyre!("sensor read failed: {e}"))?;
    if !(300.0..=1100.0).contains(&hpa) {
        eyre::bail!("sensor pressure implausible: {hpa:.2} hPa");
    }
    println!("self-check: sensor PASS ({hpa:.2} hPa)");

    println!("self-check: actuator extend/retract...");
    fn drive<A: Actuator>(actuator: &mut A, d: Direction) -> eyre::Result<()> {
        actuator
            .set_direction(d)
            .map_err(|e| eyre::eyre!("actuator write failed: {e}"))
    }
    drive(&mut actuator, Direction::Stop)?;
    std::thread::sleep(Duration::from_millis(500));
    drive(&mut actuator, Direction::Extend)?;
    std::thread::sleep(Duration::from_secs(EXERCISE_S));
    drive(&mut actuator, Direction::Stop)?;
    std::thread::sleep(Duration::from_millis(500));
    drive(&mut actuator, Direction::Retract)?;
    std::thread::sleep(Duration::from_secs(EXERCISE_S));
    drive(&mut actuator, Direction::Stop)?;
    println!("self-check: actuator PASS");

    println!("OK");
    Ok(())
}

/// Park the carriage at the floor: retract long enough to cover the whole
/// travel range from any position, then release.
pub fn reset(cfg: &breath_config::Config) -> eyre::Result<()> {
    let (_sensor, mut actuator) =
        make_hardware(cfg, &RunOverrides::default()).wrap_err("open hardware")?;

    let ticks = cfg.actuator.max_distance.max(0) as u64;
    let period = breath_core::util::period(cfg.filter.sample_rate_hz);

    tracing::info!(ticks, "parking carriage at floor");
    actuator
        .set_direction(Direction::Retract)
        .map_err(|e| eyre::eyre!("actuator write failed: {e}"))?;
    std::thread::sleep(period * ticks as u32);
    actuator
        .set_direction(Direction::Stop)
        .map_err(|e| eyre::eyre!("actuator write failed: {e}"))?;

    println!("carriage parked");
    Ok(())
}
