//! Real-time Butterworth low-pass filter.
//!
//! The breathing signal is a slow (~0.1-0.5 Hz) oscillation riding on a
//! ~1000 hPa baseline, polluted by sensor noise well above a few Hz. One
//! low-pass stage is the only spectral processing in the system, so it has
//! to be cheap (one call per 60 Hz tick) and transient-free at start-up.
//!
//! An order-n Butterworth is realized as n/2 cascaded biquad sections in
//! direct form II transposed; each section carries two state words, so the
//! total state length equals the filter order and is fixed for the session
//! lifetime. Sections are seeded to the steady-state response of a given
//! initial value so the very first `process` call of a constant input
//! returns that value exactly.

use crate::error::{BuildError, Result};

/// One second-order section, direct form II transposed.
#[derive(Debug, Clone)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl Biquad {
    /// Low-pass section at `cutoff_hz` for sample rate `fs_hz` with pole
    /// quality `q`. Coefficients normalized so a0 == 1.
    fn lowpass(cutoff_hz: f64, fs_hz: f64, q: f64) -> Self {
        let omega = 2.0 * std::f64::consts::PI * cutoff_hz / fs_hz;
        let (sin_w, cos_w) = omega.sin_cos();
        let alpha = sin_w / (2.0 * q);

        let b0 = (1.0 - cos_w) / 2.0;
        let b1 = 1.0 - cos_w;
        let b2 = (1.0 - cos_w) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, x: f64) -> f64 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }

    /// Set the section state to its steady-state response for constant
    /// input `v`. With unity DC gain this makes process(v) return v
    /// immediately (the lfilter_zi construction, solved per section).
    fn seed(&mut self, v: f64) {
        self.z1 = v * (self.b1 - self.a1 + self.b2 - self.a2);
        self.z2 = v * (self.b2 - self.a2);
    }
}

/// Cascaded-biquad Butterworth low-pass, one scalar in, one scalar out.
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    sections: Vec<Biquad>,
    order: usize,
}

impl LowPassFilter {
    /// Design an order-`order` Butterworth low-pass and seed it so that a
    /// constant stream equal to `initial_value` passes through unchanged
    /// from the first sample.
    ///
    /// `order` must be even and in 2..=8; `cutoff_hz` must sit strictly
    /// between 0 and the Nyquist frequency.
    pub fn new(
        order: usize,
        cutoff_hz: f64,
        sample_rate_hz: f64,
        initial_value: f64,
    ) -> Result<Self> {
        if order == 0 || order % 2 != 0 || order > 8 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "filter order must be even and in 2..=8",
            )));
        }
        if !(sample_rate_hz > 0.0) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "filter sample rate must be > 0",
            )));
        }
        if !(cutoff_hz > 0.0 && cutoff_hz < sample_rate_hz / 2.0) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "filter cutoff must be in (0, sample_rate/2)",
            )));
        }

        // Butterworth pole pairs: Q_k = 1 / (2 sin((2k+1)*pi/(2n)))
        let n = order as f64;
        let sections = (0..order / 2)
            .map(|k| {
                let theta = (2 * k + 1) as f64 * std::f64::consts::PI / (2.0 * n);
                let q = 1.0 / (2.0 * theta.sin());
                Biquad::lowpass(cutoff_hz, sample_rate_hz, q)
            })
            .collect::<Vec<_>>();

        let mut filter = Self { sections, order };
        filter.seed(initial_value);
        Ok(filter)
    }

    /// Filter one raw sample, updating internal state.
    #[inline]
    pub fn process(&mut self, raw: f64) -> f64 {
        self.sections
            .iter_mut()
            .fold(raw, |x, section| section.process(x))
    }

    /// Re-seed every section to the steady state of `value`.
    pub fn seed(&mut self, value: f64) {
        for section in &mut self.sections {
            section.seed(value);
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f64 = 60.0;
    const CUTOFF: f64 = 2.0;

    #[test]
    fn rejects_odd_or_oversized_order() {
        assert!(LowPassFilter::new(3, CUTOFF, FS, 0.0).is_err());
        assert!(LowPassFilter::new(0, CUTOFF, FS, 0.0).is_err());
        assert!(LowPassFilter::new(10, CUTOFF, FS, 0.0).is_err());
    }

    #[test]
    fn rejects_cutoff_at_nyquist() {
        assert!(LowPassFilter::new(4, FS / 2.0, FS, 0.0).is_err());
        assert!(LowPassFilter::new(4, -1.0, FS, 0.0).is_err());
    }

    #[test]
    fn state_length_equals_order() {
        let f = LowPassFilter::new(4, CUTOFF, FS, 0.0).unwrap();
        assert_eq!(f.sections.len() * 2, f.order());
    }

    #[test]
    fn seeded_filter_has_no_startup_transient() {
        let baseline = 1013.25;
        let mut f = LowPassFilter::new(4, CUTOFF, FS, baseline).unwrap();
        for _ in 0..10 {
            let y = f.process(baseline);
            assert!(
                (y - baseline).abs() < 1e-9,
                "seeded constant must pass through, got {y}"
            );
        }
    }

    #[test]
    fn constant_input_converges_from_any_seed() {
        let mut f = LowPassFilter::new(4, CUTOFF, FS, 0.0).unwrap();
        let mut y = 0.0;
        for _ in 0..600 {
            y = f.process(5.0);
        }
        assert!((y - 5.0).abs() < 1e-6, "expected convergence to 5.0, got {y}");
    }

    #[test]
    fn attenuates_above_cutoff_passes_below() {
        // 20 Hz tone (10x cutoff) should nearly vanish; 0.25 Hz breathing
        // rate should survive nearly unscathed.
        let mut hi = LowPassFilter::new(4, CUTOFF, FS, 0.0).unwrap();
        let mut lo = LowPassFilter::new(4, CUTOFF, FS, 0.0).unwrap();
        let mut hi_peak: f64 = 0.0;
        let mut lo_peak: f64 = 0.0;
        for i in 0..1200 {
            let t = f64::from(i) / FS;
            let yh = hi.process((2.0 * std::f64::consts::PI * 20.0 * t).sin());
            let yl = lo.process((2.0 * std::f64::consts::PI * 0.25 * t).sin());
            if i > 600 {
                hi_peak = hi_peak.max(yh.abs());
                lo_peak = lo_peak.max(yl.abs());
            }
        }
        assert!(hi_peak < 0.01, "20 Hz should be attenuated, peak {hi_peak}");
        assert!(lo_peak > 0.95, "0.25 Hz should pass, peak {lo_peak}");
    }
}
