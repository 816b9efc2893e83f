//! Fixed-period session loop.
//!
//! Paces `SessionCore::step` at the configured sample rate: each tick
//! measures its own processing time and sleeps only the remainder. An
//! overrunning tick sleeps nothing and the next tick starts immediately;
//! no catch-up or backlog compensation is attempted. The actuator is
//! neutralized on every exit path.

use breath_traits::clock::Clock;
use breath_traits::{Actuator, PressureSensor};

use crate::error::Result;
use crate::{SessionCore, SessionStatus, TickReport, util};

/// End-of-run accounting for CLI output.
#[derive(Debug, Clone, Copy)]
pub struct SessionSummary {
    pub ticks: u64,
    pub skipped_ticks: u64,
    pub breaths_detected: u64,
    pub final_target_s: f64,
}

/// Drive the session until the stop signal is honored. Returns summary
/// statistics; hardware is left neutralized whether the loop ends by stop
/// or by error.
///
/// `on_tick` receives every tick report; cue delivery (socket write, queue
/// push, log line) is the caller's business, never the loop's.
pub fn run<P, A, C, F>(
    core: &mut SessionCore<P, A>,
    clock: &C,
    mut on_tick: F,
) -> Result<SessionSummary>
where
    P: PressureSensor,
    A: Actuator,
    C: Clock,
    F: FnMut(&TickReport),
{
    let period = util::period(core.sample_rate_hz());
    let mut ticks: u64 = 0;

    tracing::info!(
        rate_hz = core.sample_rate_hz(),
        "session loop started"
    );

    loop {
        let tick_start = clock.now();

        let status = match core.step() {
            Ok(s) => s,
            Err(e) => {
                // Guaranteed release even on the error path.
                core.neutralize();
                return Err(e);
            }
        };

        match status {
            SessionStatus::Running(report) => {
                on_tick(&report);
                ticks += 1;
                let spent = clock.now().saturating_duration_since(tick_start);
                if let Some(remaining) = period.checked_sub(spent) {
                    clock.sleep(remaining);
                }
                // Overrun: no sleep, run behind schedule by design.
            }
            SessionStatus::Stopped => {
                let summary = SessionSummary {
                    ticks,
                    skipped_ticks: core.skipped_ticks(),
                    breaths_detected: core.breaths_detected(),
                    final_target_s: core.target_period(),
                };
                tracing::info!(
                    ticks = summary.ticks,
                    breaths = summary.breaths_detected,
                    final_target_s = summary.final_target_s,
                    "session loop stopped"
                );
                return Ok(summary);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::NullActuator;
    use breath_traits::clock::ManualClock;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::time::Duration;

    /// Sensor producing a constant pressure; counts reads.
    struct ConstSensor(Arc<AtomicU64>);
    impl PressureSensor for ConstSensor {
        fn read(
            &mut self,
            _timeout: Duration,
        ) -> std::result::Result<f64, Box<dyn std::error::Error + Send + Sync>> {
            self.0.fetch_add(1, Ordering::Relaxed);
            Ok(1013.25)
        }
    }

    #[test]
    fn loop_honors_stop_and_reports_ticks() {
        let reads = Arc::new(AtomicU64::new(0));
        let stop = Arc::new(AtomicBool::new(false));
        let stop_in_core = stop.clone();
        let reads_for_stop = reads.clone();

        let mut core = crate::SessionBuilder::new()
            .with_sensor(ConstSensor(reads.clone()))
            .with_actuator(NullActuator::default())
            .with_stop_check(move || {
                // Stop after 30 processed reads.
                reads_for_stop.load(Ordering::Relaxed) >= 30 || stop_in_core.load(Ordering::Relaxed)
            })
            .build()
            .unwrap();

        let clock = ManualClock::new();
        let mut reports = 0u64;
        let summary = run(&mut core, &clock, |_| reports += 1).unwrap();
        assert_eq!(summary.ticks, 30);
        assert_eq!(reports, 30);
        assert_eq!(summary.skipped_ticks, 0);
        assert!((summary.final_target_s - 4.0).abs() < 1e-12);
    }
}
