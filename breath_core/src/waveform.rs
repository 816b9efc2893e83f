//! Actuator waveform generation.
//!
//! Guide mode runs a half-cycle square wave against the target period;
//! mirror mode echoes the user's own classified breathing back to the
//! carriage while calibration samples accumulate.

use breath_traits::Direction;

use crate::UserAction;

/// Pacing cue matching the actuator's current half-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreathCue {
    Inhale,
    Exhale,
}

impl BreathCue {
    /// Wire label used by the display protocol (`ANIM:<LABEL>`).
    pub fn label(self) -> &'static str {
        match self {
            BreathCue::Inhale => "INHALE",
            BreathCue::Exhale => "EXHALE",
        }
    }
}

/// One tick of waveform output.
#[derive(Debug, Clone, Copy)]
pub struct WaveformStep {
    pub direction: Direction,
    /// Set only on an actual half-cycle change, never per-tick.
    pub cue: Option<BreathCue>,
}

/// Half-cycle square-wave generator for the Guide phase.
///
/// Extends for the first half of the target period, retracts for the
/// second half, wraps at the period boundary. Direction is decided
/// against the cycle timer as it stood at tick start. The timer is kept
/// as a tick count and converted with one multiplication per comparison,
/// so half-cycle and wrap boundaries land on exact ticks instead of
/// drifting with an accumulated float sum.
#[derive(Debug, Clone, Default)]
pub struct GuideWaveform {
    cycle_ticks: u64,
    last_cue: Option<BreathCue>,
}

impl GuideWaveform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart the cycle (Guide-phase entry).
    pub fn reset(&mut self) {
        self.cycle_ticks = 0;
        self.last_cue = None;
    }

    pub fn step(
        &mut self,
        target_period_s: f64,
        dt_s: f64,
        position: i32,
        max_distance: i32,
    ) -> WaveformStep {
        let timer_s = self.cycle_ticks as f64 * dt_s;
        let half = target_period_s / 2.0;
        let (direction, label) = if timer_s < half {
            let d = if position <= max_distance {
                Direction::Extend
            } else {
                Direction::Stop
            };
            (d, BreathCue::Inhale)
        } else {
            let d = if position >= 0 {
                Direction::Retract
            } else {
                Direction::Stop
            };
            (d, BreathCue::Exhale)
        };

        self.cycle_ticks += 1;
        if self.cycle_ticks as f64 * dt_s >= target_period_s {
            self.cycle_ticks = 0;
        }

        let cue = (self.last_cue != Some(label)).then_some(label);
        self.last_cue = Some(label);
        WaveformStep { direction, cue }
    }
}

/// Mirror-mode direction: echo the held classification with the same clamp
/// rules as the guide waveform. Unchanged means no edge seen yet.
pub fn mirror_direction(action: UserAction, position: i32, max_distance: i32) -> Direction {
    match action {
        UserAction::Inhaling => {
            if position <= max_distance {
                Direction::Extend
            } else {
                Direction::Stop
            }
        }
        UserAction::Exhaling => {
            if position >= 0 {
                Direction::Retract
            } else {
                Direction::Stop
            }
        }
        UserAction::Unchanged => Direction::Stop,
    }
}

/// Single enforcement point for the position invariant: apply one tick of
/// travel and clamp into `[0, max_distance]`.
#[inline]
pub fn apply_travel(position: i32, direction: Direction, max_distance: i32) -> i32 {
    (position + direction.travel()).clamp(0, max_distance)
}
