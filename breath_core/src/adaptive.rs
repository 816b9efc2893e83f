//! Adaptive target-rate controller.
//!
//! Watches a sliding window of completed breath durations and nudges the
//! paced period: consistently on-pace users are rewarded with a slower
//! (harder) target, users who drift far off have the pace snapped back to
//! what they are actually doing. The middle band between the two
//! thresholds produces no verdict and slides the window by one.

use std::collections::VecDeque;

use crate::AdaptiveCfg;
use crate::util::mean;

/// Result of one window evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalOutcome {
    /// Insufficient evidence; window slides by one.
    None,
    /// Someone strayed past the fail threshold; target snaps to the mean.
    Fail,
    /// Every breath within the success band; target grows harder.
    Success,
}

/// Sliding-window evaluator owning the current target breath period.
#[derive(Debug, Clone)]
pub struct AdaptiveController {
    cfg: AdaptiveCfg,
    window: VecDeque<f64>,
    target_period_s: f64,
}

impl AdaptiveController {
    pub fn new(cfg: AdaptiveCfg, initial_target_s: f64) -> Self {
        let cap = cfg.sampling_window.max(1);
        Self {
            cfg,
            window: VecDeque::with_capacity(cap),
            target_period_s: initial_target_s,
        }
    }

    pub fn target_period(&self) -> f64 {
        self.target_period_s
    }

    /// Overwrite the target period (Mirror-phase calibration result).
    pub fn set_target_period(&mut self, target_s: f64) {
        self.target_period_s = target_s;
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Record one completed breath and evaluate if the window is full.
    ///
    /// Success and Fail adopt the returned target and clear the whole
    /// window; None with a full window evicts only the oldest entry. The
    /// asymmetry is load-bearing: a verdict restarts evidence collection,
    /// a non-verdict keeps waiting for one more breath.
    pub fn record(&mut self, duration_s: f64) -> EvalOutcome {
        self.window.push_back(duration_s);
        if self.window.len() < self.cfg.sampling_window {
            return EvalOutcome::None;
        }

        let (outcome, next_target) =
            Self::evaluate(self.window.make_contiguous(), self.target_period_s, &self.cfg);
        match outcome {
            EvalOutcome::Success | EvalOutcome::Fail => {
                self.target_period_s = next_target;
                self.window.clear();
            }
            EvalOutcome::None => {
                self.window.pop_front();
            }
        }
        outcome
    }

    /// Pure evaluation of the last `sampling_window` durations against the
    /// target period. Exposed for direct property testing.
    ///
    /// - all |deviation%| <= success threshold: `(Success, target + step)`
    /// - any |deviation%| >  fail threshold:    `(Fail, mean(recent))`
    /// - otherwise:                             `(None, target)`
    pub fn evaluate(window: &[f64], target_s: f64, cfg: &AdaptiveCfg) -> (EvalOutcome, f64) {
        if window.len() < cfg.sampling_window {
            return (EvalOutcome::None, target_s);
        }
        let recent = &window[window.len() - cfg.sampling_window..];
        let deviation_pct =
            |d: f64| ((d - target_s) / target_s * 100.0).abs();

        if recent.iter().all(|&d| deviation_pct(d) <= cfg.success_threshold_pct) {
            return (EvalOutcome::Success, target_s + cfg.increase_breath_s);
        }
        if recent.iter().any(|&d| deviation_pct(d) > cfg.fail_threshold_pct) {
            // mean of a non-empty window; sampling_window >= 1 is enforced
            // at build time
            let snapped = mean(recent).unwrap_or(target_s);
            return (EvalOutcome::Fail, snapped);
        }
        (EvalOutcome::None, target_s)
    }
}
