//! `breath` — breathing-guidance pacer CLI.

mod check;
mod cli;
mod error_fmt;
mod relay;
mod session_run;

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::session_run::RunOverrides;

fn main() {
    let code = match real_main() {
        Ok(()) => 0,
        Err(e) => {
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", error_fmt::format_error_json(&e));
            } else {
                eprintln!("{}", error_fmt::humanize(&e));
            }
            error_fmt::exit_code_for_error(&e)
        }
    };
    std::process::exit(code);
}

fn real_main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let cfg = load_config(&cli)?;
    init_tracing(&cli.log_level, cli.json, &cfg.logging);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
        })
        .wrap_err("install signal handler")?;
    }

    match cli.cmd {
        Commands::Run {
            warmup_s,
            mirror_s,
            announce,
            snapshots,
            sim_breath_s,
            duration_s,
        } => {
            let overrides = RunOverrides {
                warmup_s,
                mirror_s,
                sim_breath_s,
            };
            // Optional wall-clock deadline folds into the cooperative stop
            // signal so the loop still neutralizes the actuator on exit.
            if let Some(limit_s) = duration_s {
                let deadline = std::time::Instant::now()
                    + std::time::Duration::from_secs_f64(limit_s.max(0.0));
                let shutdown = shutdown.clone();
                std::thread::spawn(move || {
                    loop {
                        if shutdown.load(Ordering::Relaxed) {
                            return;
                        }
                        if std::time::Instant::now() >= deadline {
                            shutdown.store(true, Ordering::Relaxed);
                            return;
                        }
                        std::thread::sleep(std::time::Duration::from_millis(20));
                    }
                });
            }
            let summary = session_run::run_session(
                &cfg,
                &overrides,
                snapshots.as_ref(),
                shutdown,
                move |report| {
                    if announce && let Some(cue) = report.cue {
                        println!("ANIM:{}", cue.label());
                        let _ = std::io::stdout().flush();
                    }
                },
            )?;
            session_run::print_summary(&summary, cli.json);
            Ok(())
        }
        Commands::Serve { bind } => relay::serve(&cfg, bind.as_deref(), shutdown),
        Commands::SelfCheck => check::self_check(&cfg),
        Commands::Reset => check::reset(&cfg),
    }
}

fn load_config(cli: &Cli) -> eyre::Result<breath_config::Config> {
    if cli.config.exists() {
        let text = std::fs::read_to_string(&cli.config)
            .wrap_err_with(|| format!("read config {:?}", cli.config))?;
        let cfg = breath_config::load_toml(&text)
            .map_err(|e| eyre::eyre!("parse config {:?}: {e}", cli.config))?;
        cfg.validate()?;
        Ok(cfg)
    } else {
        // No config file is fine; the defaults mirror the original device.
        Ok(breath_config::Config::default())
    }
}

fn init_tracing(level: &str, json: bool, logging: &breath_config::Logging) {
    // RUST_LOG wins, then an explicit --log-level, then the config file.
    let effective = if level != "info" {
        level
    } else {
        logging.level.as_deref().unwrap_or(level)
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective));

    let console = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file_layer = logging.file.as_ref().map(|path| {
        let path = std::path::Path::new(path);
        let dir = match path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => std::path::Path::new("."),
        };
        let name = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("breath.log"));
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .boxed()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();
}
