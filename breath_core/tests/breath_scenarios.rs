//! End-to-end signal-path scenarios: raw stream -> filter -> edge
//! detection -> breath timing, using the default order-4 / 2 Hz / 60 Hz
//! filter seeded at the first raw value.

use breath_core::{BreathTimer, LowPassFilter, UserAction};

const DT: f64 = 1.0 / 60.0;
const BASELINE: f64 = 1013.25;

/// Triangle breathing: strictly increasing for 1.5s, strictly decreasing
/// for 1.5s. One full cycle is one breath of 3.0s measured between
/// consecutive exhale-to-inhale transitions.
fn triangle(tick: usize) -> f64 {
    let half = 90; // 1.5s at 60 Hz
    let pos = tick % (2 * half);
    let ramp = if pos < half {
        pos as f64
    } else {
        (2 * half - pos) as f64
    };
    BASELINE + 0.002 * ramp
}

#[test]
fn triangle_wave_yields_one_breath_per_cycle() {
    let first = triangle(0);
    let mut filter = LowPassFilter::new(4, 2.0, 60.0, first).unwrap();
    let mut timer = BreathTimer::new();
    let mut prev = filter.process(first);

    let cycles = 6;
    let mut durations = Vec::new();
    for tick in 1..cycles * 180 {
        let filtered = filter.process(triangle(tick));
        let action = UserAction::classify(filtered, prev);
        if let Some(d) = timer.update(action, DT, 0.5) {
            durations.push(d);
        }
        prev = filtered;
    }

    // The first detected transition closes a partial cycle; every full
    // cycle afterwards must produce exactly one duration of ~3.0s.
    assert!(
        durations.len() >= cycles - 2,
        "expected about one duration per cycle, got {durations:?}"
    );
    let full: Vec<f64> = durations
        .iter()
        .copied()
        .filter(|d| (d - 3.0).abs() < 0.3)
        .collect();
    assert!(
        full.len() >= cycles - 3,
        "full cycles should measure ~3.0s within filter-settling tolerance, got {durations:?}"
    );
    for d in &full {
        assert!((d - 3.0).abs() < 0.3, "duration {d} outside tolerance");
    }
}

#[test]
fn constant_stream_yields_no_breaths() {
    let mut filter = LowPassFilter::new(4, 2.0, 60.0, BASELINE).unwrap();
    let mut timer = BreathTimer::new();
    let mut prev = filter.process(BASELINE);
    for _ in 0..600 {
        let filtered = filter.process(BASELINE);
        let action = UserAction::classify(filtered, prev);
        assert_eq!(action, UserAction::Unchanged);
        assert_eq!(timer.update(action, DT, 0.5), None);
        prev = filtered;
    }
}

#[test]
fn noisy_flutter_below_threshold_is_rejected() {
    // A slow 4s sine with a burst of high-frequency jitter: the low-pass
    // plus the 0.5s glitch filter must keep one breath per 4s cycle.
    let mut filter = LowPassFilter::new(4, 2.0, 60.0, BASELINE).unwrap();
    let mut timer = BreathTimer::new();
    let mut prev = filter.process(BASELINE);

    let mut durations = Vec::new();
    let n = 10 * 240; // 10 cycles of 4s
    for tick in 1..n {
        let t = tick as f64 * DT;
        let slow = 0.12 * (2.0 * std::f64::consts::PI * t / 4.0).sin();
        let jitter = 0.01 * (2.0 * std::f64::consts::PI * 17.0 * t).sin();
        let filtered = filter.process(BASELINE + slow + jitter);
        let action = UserAction::classify(filtered, prev);
        if let Some(d) = timer.update(action, DT, 0.5) {
            durations.push(d);
        }
        prev = filtered;
    }

    assert!(
        (8..=11).contains(&durations.len()),
        "expected ~10 breaths over 10 cycles, got {}: {durations:?}",
        durations.len()
    );
    for d in durations.iter().skip(1) {
        assert!((d - 4.0).abs() < 0.4, "duration {d} off the 4s cycle");
    }
}
