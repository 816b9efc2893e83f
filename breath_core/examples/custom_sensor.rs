//! Custom Hardware Example
//!
//! Shows how to plug your own sensor and actuator into the session core
//! by implementing the `breath_traits` traits — here a replayed pressure
//! recording and an actuator that draws the carriage position as a bar.
//!
//! Run with `cargo run --example custom_sensor -p breath_core`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use breath_core::{SessionBuilder, SessionCfg, SessionStatus};
use breath_traits::{Actuator, Direction, PressureSensor};

/// Replays a pre-recorded pressure trace, then repeats its last second.
struct ReplaySensor {
    samples: Vec<f64>,
    index: usize,
}

impl ReplaySensor {
    fn synthetic(seconds: usize) -> Self {
        // A 3.2s breathing cycle sampled at 60 Hz.
        let samples = (0..seconds * 60)
            .map(|i| {
                let t = i as f64 / 60.0;
                1013.25 + 0.15 * (2.0 * std::f64::consts::PI * t / 3.2).sin()
            })
            .collect();
        Self { samples, index: 0 }
    }
}

impl PressureSensor for ReplaySensor {
    fn read(
        &mut self,
        _timeout: Duration,
    ) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        let wrap = self.samples.len().saturating_sub(60);
        if self.index >= self.samples.len() {
            self.index = wrap;
        }
        let v = self.samples[self.index];
        self.index += 1;
        Ok(v)
    }
}

/// Tracks commanded travel and renders the carriage position on stdout.
struct BarActuator {
    position: i32,
}

impl Actuator for BarActuator {
    fn set_direction(
        &mut self,
        direction: Direction,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.position = (self.position + direction.travel()).clamp(0, 50);
        if self.position % 10 == 0 && direction != Direction::Stop {
            println!("carriage |{}>", "=".repeat(self.position as usize / 2));
        }
        Ok(())
    }
}

fn main() -> Result<(), eyre::Report> {
    let ticks_done = Arc::new(AtomicU64::new(0));
    let ticks_for_stop = ticks_done.clone();
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let mut core = SessionBuilder::new()
        .with_sensor(ReplaySensor::synthetic(40))
        .with_actuator(BarActuator { position: 0 })
        .with_session(SessionCfg {
            warmup_s: 1.0,
            mirror_s: 8.0,
            ..SessionCfg::default()
        })
        .with_stop_check(move || {
            stop_flag.load(Ordering::Relaxed) || ticks_for_stop.load(Ordering::Relaxed) >= 1800
        })
        .build()?;

    // Drive the core directly (no wall-clock pacing needed for a replay).
    loop {
        match core.step()? {
            SessionStatus::Running(report) => {
                ticks_done.fetch_add(1, Ordering::Relaxed);
                if let Some(cue) = report.cue {
                    println!("cue: {}", cue.label());
                }
            }
            SessionStatus::Stopped => break,
        }
    }

    println!(
        "replay finished: {} breaths, target {:.2}s",
        core.breaths_detected(),
        core.target_period()
    );
    Ok(())
}
