//! Breath-edge detection and per-breath timing.
//!
//! Direction is classified from the sign of the filtered pressure delta
//! alone. There is deliberately no deadband beyond the low-pass stage;
//! whether that minimalism is a latent flutter bug is tracked as an open
//! question in DESIGN.md rather than patched here.

use crate::UserAction;

/// Which half of the breath the user is currently in, as last classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreathState {
    Inhale,
    Exhale,
}

impl UserAction {
    /// Classify the instantaneous breathing direction from two consecutive
    /// filtered samples. Equal samples carry no new information.
    #[inline]
    pub fn classify(curr: f64, prev: f64) -> Self {
        if curr > prev {
            UserAction::Inhaling
        } else if curr < prev {
            UserAction::Exhaling
        } else {
            UserAction::Unchanged
        }
    }
}

/// Accumulates time since the last inhale onset and emits a completed
/// breath duration on each exhale-to-inhale transition.
#[derive(Debug, Clone)]
pub struct BreathTimer {
    state: BreathState,
    elapsed_s: f64,
}

impl Default for BreathTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl BreathTimer {
    pub fn new() -> Self {
        Self {
            // Matches the original boot assumption: the first observed
            // rise counts as an inhale onset.
            state: BreathState::Exhale,
            elapsed_s: 0.0,
        }
    }

    /// Adopt a classification without any timing side effects (warm-up
    /// seeding while the filter settles).
    pub fn seed(&mut self, action: UserAction) {
        match action {
            UserAction::Inhaling => self.state = BreathState::Inhale,
            UserAction::Exhaling => self.state = BreathState::Exhale,
            UserAction::Unchanged => {}
        }
    }

    /// Zero the accumulator, keeping the current breath state.
    pub fn reset(&mut self) {
        self.elapsed_s = 0.0;
    }

    pub fn state(&self) -> BreathState {
        self.state
    }

    /// One tick of breath timing.
    ///
    /// The transition check runs against the accumulator as it stood at
    /// the start of the tick; `dt_s` is added afterwards, unconditionally.
    /// On an exhale-to-inhale transition the accumulated duration is
    /// emitted iff it exceeds `min_breath_s` (shorter runs are glitches,
    /// discarded silently) and the accumulator restarts either way.
    pub fn update(&mut self, action: UserAction, dt_s: f64, min_breath_s: f64) -> Option<f64> {
        let mut completed = None;
        match (self.state, action) {
            (BreathState::Exhale, UserAction::Inhaling) => {
                if self.elapsed_s > min_breath_s {
                    completed = Some(self.elapsed_s);
                }
                self.elapsed_s = 0.0;
                self.state = BreathState::Inhale;
            }
            (BreathState::Inhale, UserAction::Exhaling) => {
                self.state = BreathState::Exhale;
            }
            _ => {}
        }
        self.elapsed_s += dt_s;
        completed
    }
}
