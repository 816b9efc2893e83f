//! Session assembly and execution: config mapping, hardware selection,
//! snapshot plumbing, and the run loop.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use breath_core::runner::SessionSummary;
use breath_core::{SessionBuilder, TickReport, snapshot};
use breath_traits::clock::MonotonicClock;
use eyre::WrapErr;

/// Overrides accepted from the command line.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunOverrides {
    pub warmup_s: Option<f64>,
    pub mirror_s: Option<f64>,
    pub sim_breath_s: Option<f64>,
}

#[cfg(feature = "hardware")]
pub fn make_hardware(
    cfg: &breath_config::Config,
    _overrides: &RunOverrides,
) -> eyre::Result<(
    breath_hardware::HardwarePressureSensor,
    breath_hardware::HardwareActuator,
)> {
    let sensor =
        breath_hardware::HardwarePressureSensor::new(cfg.pins.i2c_bus, cfg.pins.bmp280_addr)
            .wrap_err("open BMP280")?;
    let actuator =
        breath_hardware::HardwareActuator::new(cfg.pins.in1, cfg.pins.in2, cfg.pins.enable)
            .wrap_err("open actuator pins")?;
    Ok((sensor, actuator))
}

#[cfg(not(feature = "hardware"))]
pub fn make_hardware(
    cfg: &breath_config::Config,
    overrides: &RunOverrides,
) -> eyre::Result<(
    breath_hardware::SimulatedPressureSensor,
    breath_hardware::SimulatedActuator,
)> {
    let breath_s = overrides.sim_breath_s.unwrap_or(4.0);
    Ok((
        breath_hardware::SimulatedPressureSensor::new(breath_s, cfg.filter.sample_rate_hz),
        breath_hardware::SimulatedActuator::new(),
    ))
}

/// Build the session core from config + overrides and run it to
/// completion, forwarding every tick report to `on_tick`.
pub fn run_session<F>(
    cfg: &breath_config::Config,
    overrides: &RunOverrides,
    snapshots_path: Option<&PathBuf>,
    shutdown: Arc<AtomicBool>,
    on_tick: F,
) -> eyre::Result<SessionSummary>
where
    F: FnMut(&TickReport),
{
    let mut session_cfg: breath_core::SessionCfg = (&cfg.session).into();
    if let Some(s) = overrides.warmup_s {
        session_cfg.warmup_s = s;
    }
    if let Some(s) = overrides.mirror_s {
        session_cfg.mirror_s = s;
    }

    let (sensor, actuator) = make_hardware(cfg, overrides)?;

    let mut builder = SessionBuilder::new()
        .with_sensor(sensor)
        .with_actuator(actuator)
        .with_filter((&cfg.filter).into())
        .with_session(session_cfg)
        .with_adaptive((&cfg.adaptive).into())
        .with_actuator_limits((&cfg.actuator).into())
        .with_timeouts((&cfg.timeouts).into())
        .with_stop_check(move || shutdown.load(Ordering::Relaxed));

    // Optional JSONL snapshot sink on its own consumer thread; the control
    // loop only ever publishes into the bounded channel.
    let mut writer_handle = None;
    if let Some(path) = snapshots_path {
        let (publisher, rx) = snapshot::channel(600);
        builder = builder.with_snapshots(publisher);
        let file = std::fs::File::create(path)
            .wrap_err_with(|| format!("create snapshot file {path:?}"))?;
        writer_handle = Some(std::thread::spawn(move || {
            let mut out = std::io::BufWriter::new(file);
            for snap in rx {
                let line = serde_json::json!({
                    "elapsed_s": snap.elapsed_s,
                    "raw_hpa": snap.raw_hpa,
                    "filtered_hpa": snap.filtered_hpa,
                    "phase": snap.phase.name(),
                    "position": snap.position,
                    "target_period_s": snap.target_period_s,
                });
                if writeln!(out, "{line}").is_err() {
                    break;
                }
            }
            let _ = out.flush();
        }));
    }

    let mut core = builder.build()?;
    let clock = MonotonicClock::new();
    let summary = breath_core::runner::run(&mut core, &clock, on_tick);

    // Dropping the core closes the snapshot channel; join the writer so
    // the file is complete before we report.
    drop(core);
    if let Some(handle) = writer_handle {
        let _ = handle.join();
    }

    summary
}

/// Human or JSON summary line for the `run` command.
pub fn print_summary(summary: &SessionSummary, json: bool) {
    if json {
        let obj = serde_json::json!({
            "ticks": summary.ticks,
            "skipped_ticks": summary.skipped_ticks,
            "breaths_detected": summary.breaths_detected,
            "final_target_s": summary.final_target_s,
        });
        println!("{obj}");
    } else {
        println!(
            "session stopped: {} ticks ({} skipped), {} breaths, final target {:.2}s",
            summary.ticks, summary.skipped_ticks, summary.breaths_detected, summary.final_target_s
        );
    }
}
