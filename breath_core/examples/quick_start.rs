//! Quick Start Example
//!
//! Runs a short simulated guided-breathing session: a few seconds of
//! warm-up, a short mirror/calibration phase, then the adaptive guide
//! phase, printing each pacing cue as it fires.
//!
//! Run with `cargo run --example quick_start -p breath_core`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use breath_core::{SessionBuilder, SessionCfg};
use breath_hardware::{SimulatedActuator, SimulatedPressureSensor};
use breath_traits::MonotonicClock;

fn main() -> Result<(), eyre::Report> {
    // Keep the demo short: 2s warm-up, 10s mirror, then guide until the
    // 30-second deadline below trips the stop signal.
    let session = SessionCfg {
        warmup_s: 2.0,
        mirror_s: 10.0,
        ..SessionCfg::default()
    };

    let deadline = Instant::now() + Duration::from_secs(30);
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let mut core = SessionBuilder::new()
        .with_sensor(SimulatedPressureSensor::new(3.5, 60))
        .with_actuator(SimulatedActuator::new())
        .with_session(session)
        .with_stop_check(move || stop_flag.load(Ordering::Relaxed) || Instant::now() >= deadline)
        .build()?;

    let clock = MonotonicClock::new();
    let summary = breath_core::runner::run(&mut core, &clock, |report| {
        if let Some(cue) = report.cue {
            println!("{} -> {}", report.phase.name(), cue.label());
        }
    })?;

    println!(
        "session over: {} breaths detected, final target {:.2}s",
        summary.breaths_detected, summary.final_target_s
    );
    Ok(())
}
