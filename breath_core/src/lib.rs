#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core breathing-guidance logic (hardware-agnostic).
//!
//! This crate provides the hardware-independent control core. All hardware
//! interactions go through the `breath_traits::PressureSensor` and
//! `breath_traits::Actuator` traits.
//!
//! ## Architecture
//!
//! - **Filtering**: cascaded-biquad Butterworth low-pass (`filter` module)
//! - **Edge detection & timing**: `UserAction` classification and
//!   `BreathTimer` (`breath` module)
//! - **Adaptation**: sliding-window target-rate controller (`adaptive`)
//! - **Waveform**: guide square wave and mirror echo (`waveform`)
//! - **Session**: Warmup -> Mirror -> Guide state machine (`SessionCore`)
//! - **Snapshots**: bounded-channel publishing for displays (`snapshot`)
//!
//! One `step` call corresponds to exactly one sample tick. The core never
//! sleeps; pacing belongs to `runner`.

// Module declarations
pub mod adaptive;
pub mod breath;
mod conversions;
pub mod error;
pub mod filter;
pub mod mocks;
pub mod runner;
pub mod snapshot;
pub mod util;
pub mod waveform;

use std::time::Duration;

use breath_traits::{Actuator, PressureSensor};

use crate::error::{BuildError, Result, SessionError};
use crate::util::mean;
use crate::waveform::{GuideWaveform, apply_travel, mirror_direction};

pub use crate::adaptive::{AdaptiveController, EvalOutcome};
pub use crate::breath::{BreathState, BreathTimer};
pub use crate::filter::LowPassFilter;
pub use crate::snapshot::{SnapshotPublisher, TickSnapshot};
pub use crate::waveform::{BreathCue, WaveformStep};
pub use breath_traits::Direction;

/// Instantaneous breathing direction classified from the filtered signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Inhaling,
    Exhaling,
    /// Equal consecutive samples; previous classification holds.
    Unchanged,
}

/// Session phase. Progression is strictly one-directional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Filter settling; actuator held neutral.
    Warmup,
    /// Actuator mirrors the user while baseline breaths are collected.
    Mirror,
    /// Actuator paces the user; adaptive evaluation active. Terminal.
    Guide,
}

impl SessionPhase {
    pub fn name(self) -> &'static str {
        match self {
            SessionPhase::Warmup => "warmup",
            SessionPhase::Mirror => "mirror",
            SessionPhase::Guide => "guide",
        }
    }
}

/// Filter configuration.
#[derive(Debug, Clone, Copy)]
pub struct FilterCfg {
    /// Butterworth order (even, 2..=8)
    pub order: usize,
    /// Low-pass cutoff in Hz
    pub cutoff_hz: f64,
    /// Sampling and control loop rate in Hz
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

/// Phase durations and breath-plausibility thresholds.
#[derive(Debug, Clone, Copy)]
pub struct SessionCfg {
    pub warmup_s: f64,
    pub mirror_s: f64,
    /// Target period used when Mirror collects nothing.
    pub fallback_target_s: f64,
    pub min_breath_guide_s: f64,
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

/// Adaptive-controller thresholds.
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveCfg {
    pub sampling_window: usize,
    pub success_threshold_pct: f64,
    pub fail_threshold_pct: f64,
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

/// Actuator travel limits.
#[derive(Debug, Clone, Copy)]
pub struct ActuatorCfg {
    pub max_distance: i32,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self { max_distance: 50 }
    }
}

/// Timeouts and watchdogs.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Max sensor wait per read (ms)
    pub sensor_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { sensor_ms: 150 }
    }
}

/// What one tick produced.
#[derive(Debug, Clone, Copy)]
pub struct TickReport {
    pub phase: SessionPhase,
    /// Pacing-cue change, at most one per actual transition.
    pub cue: Option<BreathCue>,
    /// True when a sensor fault skipped this tick (state retained).
    pub skipped: bool,
}

/// Public status of a single step of the session loop.
#[derive(Debug, Clone, Copy)]
pub enum SessionStatus {
    /// Keep going.
    Running(TickReport),
    /// External stop honored; actuator has been neutralized.
    Stopped,
}

/// The per-tick control core: filter, edge detection, breath timing,
/// phase sequencing, adaptation, and actuator waveform in one state
/// machine. All session state lives here; there are no globals.
pub struct SessionCore<P: PressureSensor, A: Actuator> {
    sensor: P,
    actuator: A,
    filter_cfg: FilterCfg,
    session_cfg: SessionCfg,
    actuator_cfg: ActuatorCfg,
    timeouts: Timeouts,
    // Sample interval; all timing advances in processed-sample time.
    dt_s: f64,
    // Phase lengths precomputed as whole ticks so transitions are exact
    // (no accumulated floating-point drift at the boundary).
    warmup_ticks: u64,
    mirror_ticks: u64,

    // Signal path. The filter is seeded lazily from the first raw sample
    // so the session starts transient-free.
    filter: Option<LowPassFilter>,
    prev_filtered: Option<f64>,
    // Last non-Unchanged classification (mirror drive input).
    held_action: UserAction,
    breath_timer: BreathTimer,
    adaptive: AdaptiveController,
    waveform: GuideWaveform,
    // Mirror-phase calibration list, separate from the adaptive window.
    mirror_breaths: Vec<f64>,
    // Armed at Guide entry; discards the one transitional artifact caused
    // by switching waveform modes.
    skip_first_breath: bool,

    phase: SessionPhase,
    phase_ticks: u64,
    total_ticks: u64,
    position: i32,
    breaths_detected: u64,
    skipped_ticks: u64,

    stop_check: Option<Box<dyn Fn() -> bool + Send>>,
    snapshots: Option<SnapshotPublisher>,
}

impl<P: PressureSensor, A: Actuator> core::fmt::Debug for SessionCore<P, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionCore")
            .field("phase", &self.phase)
            .field("target_period_s", &self.adaptive.target_period())
            .field("position", &self.position)
            .field("breaths_detected", &self.breaths_detected)
            .finish()
    }
}

impl<P: PressureSensor, A: Actuator> SessionCore<P, A> {
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Current machine-paced breath cycle length in seconds.
    pub fn target_period(&self) -> f64 {
        self.adaptive.target_period()
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    /// Completed breaths observed across Mirror and Guide.
    pub fn breaths_detected(&self) -> u64 {
        self.breaths_detected
    }

    /// Ticks skipped due to sensor faults.
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks
    }

    /// Sampling and control loop rate in Hz.
    pub fn sample_rate_hz(&self) -> u32 {
        self.filter_cfg.sample_rate_hz
    }

    /// One tick: read the sensor, then run the control pipeline. A failed
    /// read skips the tick (previous state retained) instead of aborting
    /// the session. The stop signal is polled exactly once, at the tick
    /// boundary before the blocking read.
    pub fn step(&mut self) -> Result<SessionStatus> {
        if self.stop_requested() {
            return Ok(self.shutdown());
        }
        let timeout = Duration::from_millis(self.timeouts.sensor_ms);
        let raw = match self.sensor.read(timeout) {
            Ok(v) => v,
            Err(e) => {
                let err = map_sensor_error(&*e);
                tracing::warn!(error = %err, "sensor read failed; tick skipped");
                self.skipped_ticks += 1;
                return Ok(SessionStatus::Running(TickReport {
                    phase: self.phase,
                    cue: None,
                    skipped: true,
                }));
            }
        };
        self.tick(raw)
    }

    /// One tick from a pre-sampled raw pressure value.
    pub fn step_from_raw(&mut self, raw: f64) -> Result<SessionStatus> {
        if self.stop_requested() {
            return Ok(self.shutdown());
        }
        self.tick(raw)
    }

    fn tick(&mut self, raw: f64) -> Result<SessionStatus> {
        let filtered = match self.filter.as_mut() {
            Some(f) => f.process(raw),
            None => {
                let mut f = LowPassFilter::new(
                    self.filter_cfg.order,
                    self.filter_cfg.cutoff_hz,
                    f64::from(self.filter_cfg.sample_rate_hz),
                    raw,
                )?;
                let y = f.process(raw);
                self.filter = Some(f);
                y
            }
        };

        let action = UserAction::classify(filtered, self.prev_filtered.unwrap_or(filtered));
        if action != UserAction::Unchanged {
            self.held_action = action;
        }

        let dt = self.dt_s;
        let max = self.actuator_cfg.max_distance;
        let mut cue = None;

        let direction = match self.phase {
            SessionPhase::Warmup => {
                self.phase_ticks += 1;
                self.breath_timer.seed(action);
                if self.phase_ticks >= self.warmup_ticks {
                    tracing::info!("warmup complete; entering mirror phase");
                    self.enter_mirror();
                }
                Direction::Stop
            }
            SessionPhase::Mirror => {
                self.phase_ticks += 1;
                let direction = mirror_direction(self.held_action, self.position, max);
                if let Some(d) =
                    self.breath_timer
                        .update(action, dt, self.session_cfg.min_breath_mirror_s)
                {
                    tracing::debug!(duration_s = d, "mirror breath recorded");
                    self.mirror_breaths.push(d);
                    self.breaths_detected += 1;
                }
                if self.phase_ticks >= self.mirror_ticks {
                    self.enter_guide();
                }
                direction
            }
            SessionPhase::Guide => {
                self.phase_ticks += 1;
                let ws =
                    self.waveform
                        .step(self.adaptive.target_period(), dt, self.position, max);
                cue = ws.cue;
                if let Some(d) =
                    self.breath_timer
                        .update(action, dt, self.session_cfg.min_breath_guide_s)
                {
                    if self.skip_first_breath {
                        self.skip_first_breath = false;
                    } else {
                        self.breaths_detected += 1;
                        match self.adaptive.record(d) {
                            EvalOutcome::Success => tracing::info!(
                                target_s = self.adaptive.target_period(),
                                "stable window; slowing the pace"
                            ),
                            EvalOutcome::Fail => tracing::info!(
                                target_s = self.adaptive.target_period(),
                                "unstable window; snapping pace to user"
                            ),
                            EvalOutcome::None => {}
                        }
                    }
                }
                ws.direction
            }
        };

        self.position = apply_travel(self.position, direction, max);
        self.drive(direction);
        self.prev_filtered = Some(filtered);
        self.total_ticks += 1;
        self.publish(raw, filtered);

        Ok(SessionStatus::Running(TickReport {
            phase: self.phase,
            cue,
            skipped: false,
        }))
    }

    /// Neutralize the actuator (direction Stop), best-effort with logging.
    /// Part of the guaranteed-release contract on every exit path.
    pub fn neutralize(&mut self) {
        self.drive(Direction::Stop);
    }

    fn enter_mirror(&mut self) {
        self.phase = SessionPhase::Mirror;
        self.phase_ticks = 0;
        self.breath_timer.reset();
    }

    fn enter_guide(&mut self) {
        let target = mean(&self.mirror_breaths)
            .unwrap_or(self.session_cfg.fallback_target_s);
        self.adaptive.set_target_period(target);
        tracing::info!(
            target_s = target,
            breaths = self.mirror_breaths.len(),
            "mirror complete; entering guide phase"
        );
        self.phase = SessionPhase::Guide;
        self.phase_ticks = 0;
        self.breath_timer.reset();
        self.skip_first_breath = true;
        self.waveform.reset();
    }

    fn stop_requested(&self) -> bool {
        self.stop_check.as_ref().is_some_and(|check| check())
    }

    fn shutdown(&mut self) -> SessionStatus {
        self.neutralize();
        tracing::info!("stop requested; actuator neutralized");
        SessionStatus::Stopped
    }

    fn drive(&mut self, direction: Direction) {
        if let Err(e) = self.actuator.set_direction(direction) {
            let err = map_actuator_error(&*e);
            tracing::warn!(error = %err, "actuator write failed; continuing");
        }
    }

    fn publish(&self, raw: f64, filtered: f64) {
        if let Some(snapshots) = &self.snapshots {
            snapshots.publish(TickSnapshot {
                elapsed_s: self.total_ticks as f64 * self.dt_s,
                raw_hpa: raw,
                filtered_hpa: filtered,
                phase: self.phase,
                position: self.position,
                target_period_s: self.adaptive.target_period(),
            });
        }
    }
}

/// Map a boxed sensor error to the typed taxonomy, downcasting hardware
/// errors when the `hardware-errors` feature is enabled.
fn map_sensor_error(e: &(dyn std::error::Error + 'static)) -> SessionError {
    #[cfg(feature = "hardware-errors")]
    if let Some(hw) = e.downcast_ref::<breath_hardware::error::HwError>() {
        return match hw {
            breath_hardware::error::HwError::Timeout => SessionError::Timeout,
            other => SessionError::Sensor(other.to_string()),
        };
    }
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        SessionError::Timeout
    } else {
        SessionError::Sensor(s)
    }
}

fn map_actuator_error(e: &(dyn std::error::Error + 'static)) -> SessionError {
    SessionError::Actuator(e.to_string())
}

/// Type-state marker for a builder slot not yet filled.
pub struct Missing;

/// Builder for `SessionCore`. Sensor and actuator are enforced at compile
/// time (build is only available once both slots hold real components);
/// everything else is validated in `build()`.
pub struct SessionBuilder<P, A> {
    sensor: P,
    actuator: A,
    filter: FilterCfg,
    session: SessionCfg,
    adaptive: AdaptiveCfg,
    actuator_cfg: ActuatorCfg,
    timeouts: Timeouts,
    stop_check: Option<Box<dyn Fn() -> bool + Send>>,
    snapshots: Option<SnapshotPublisher>,
}

impl SessionBuilder<Missing, Missing> {
    /// Start building a session.
    pub fn new() -> Self {
        Self {
            sensor: Missing,
            actuator: Missing,
            filter: FilterCfg::default(),
            session: SessionCfg::default(),
            adaptive: AdaptiveCfg::default(),
            actuator_cfg: ActuatorCfg::default(),
            timeouts: Timeouts::default(),
            stop_check: None,
            snapshots: None,
        }
    }
}

impl Default for SessionBuilder<Missing, Missing> {
    fn default() -> Self {
        Self::new()
    }
}

/// Chainable setters that do not affect type-state.
impl<P, A> SessionBuilder<P, A> {
    pub fn with_filter(mut self, filter: FilterCfg) -> Self {
        self.filter = filter;
        self
    }
    pub fn with_session(mut self, session: SessionCfg) -> Self {
        self.session = session;
        self
    }
    pub fn with_adaptive(mut self, adaptive: AdaptiveCfg) -> Self {
        self.adaptive = adaptive;
        self
    }
    pub fn with_actuator_limits(mut self, actuator_cfg: ActuatorCfg) -> Self {
        self.actuator_cfg = actuator_cfg;
        self
    }
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
    /// Cooperative stop signal, polled once per tick boundary.
    pub fn with_stop_check<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + Send + 'static,
    {
        self.stop_check = Some(Box::new(f));
        self
    }
    /// Publish per-tick snapshots for a display consumer.
    pub fn with_snapshots(mut self, publisher: SnapshotPublisher) -> Self {
        self.snapshots = Some(publisher);
        self
    }

    /// Provide the pressure sensor (advances type-state).
    pub fn with_sensor<P2: PressureSensor>(self, sensor: P2) -> SessionBuilder<P2, A> {
        let SessionBuilder {
            sensor: _,
            actuator,
            filter,
            session,
            adaptive,
            actuator_cfg,
            timeouts,
            stop_check,
            snapshots,
        } = self;
        SessionBuilder {
            sensor,
            actuator,
            filter,
            session,
            adaptive,
            actuator_cfg,
            timeouts,
            stop_check,
            snapshots,
        }
    }

    /// Provide the actuator (advances type-state).
    pub fn with_actuator<A2: Actuator>(self, actuator: A2) -> SessionBuilder<P, A2> {
        let SessionBuilder {
            sensor,
            actuator: _,
            filter,
            session,
            adaptive,
            actuator_cfg,
            timeouts,
            stop_check,
            snapshots,
        } = self;
        SessionBuilder {
            sensor,
            actuator,
            filter,
            session,
            adaptive,
            actuator_cfg,
            timeouts,
            stop_check,
            snapshots,
        }
    }
}

impl<P: PressureSensor, A: Actuator> SessionBuilder<P, A> {
    /// Validate the configuration and build the session core.
    pub fn build(self) -> Result<SessionCore<P, A>> {
        let SessionBuilder {
            sensor,
            actuator,
            filter,
            session,
            adaptive,
            actuator_cfg,
            timeouts,
            stop_check,
            snapshots,
        } = self;

        if filter.order == 0 || filter.order % 2 != 0 || filter.order > 8 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "filter order must be even and in 2..=8",
            )));
        }
        if filter.sample_rate_hz == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "sample_rate_hz must be > 0",
            )));
        }
        if !(filter.cutoff_hz > 0.0
            && filter.cutoff_hz < f64::from(filter.sample_rate_hz) / 2.0)
        {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "cutoff_hz must be in (0, sample_rate_hz/2)",
            )));
        }
        if session.warmup_s < 0.0 || session.mirror_s < 0.0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "phase durations must be >= 0",
            )));
        }
        if session.fallback_target_s <= 0.0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "fallback_target_s must be > 0",
            )));
        }
        if session.min_breath_guide_s < 0.0 || session.min_breath_mirror_s < 0.0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "min breath thresholds must be >= 0",
            )));
        }
        if adaptive.sampling_window == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "sampling_window must be >= 1",
            )));
        }
        if adaptive.success_threshold_pct < 0.0
            || adaptive.fail_threshold_pct < adaptive.success_threshold_pct
        {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "thresholds must satisfy 0 <= success <= fail",
            )));
        }
        if adaptive.increase_breath_s <= 0.0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "increase_breath_s must be > 0",
            )));
        }
        if actuator_cfg.max_distance <= 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max_distance must be > 0",
            )));
        }
        if timeouts.sensor_ms == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "sensor_ms must be >= 1",
            )));
        }

        let dt_s = util::sample_interval_s(filter.sample_rate_hz);
        let fallback = session.fallback_target_s;
        let rate = f64::from(filter.sample_rate_hz);
        let warmup_ticks = (session.warmup_s * rate).round() as u64;
        let mirror_ticks = (session.mirror_s * rate).round() as u64;

        Ok(SessionCore {
            sensor,
            actuator,
            filter_cfg: filter,
            session_cfg: session,
            actuator_cfg,
            timeouts,
            dt_s,
            warmup_ticks,
            mirror_ticks,
            filter: None,
            prev_filtered: None,
            held_action: UserAction::Unchanged,
            breath_timer: BreathTimer::new(),
            adaptive: AdaptiveController::new(adaptive, fallback),
            waveform: GuideWaveform::new(),
            mirror_breaths: Vec::new(),
            skip_first_breath: false,
            phase: SessionPhase::Warmup,
            phase_ticks: 0,
            total_ticks: 0,
            position: 0,
            breaths_detected: 0,
            skipped_ticks: 0,
            stop_check,
            snapshots,
        })
    }
}
