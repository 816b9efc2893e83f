//! Line-oriented TCP relay for the remote display client.
//!
//! Protocol (newline-delimited UTF-8, preserved verbatim from the
//! existing display client):
//!   -> RUN:FIX            start a session (restarts a running one)
//!   <- OK: FIX_STARTED
//!   -> STOP               stop the running session
//!   <- OK: STOPPED        (or INFO: NOTHING_RUNNING)
//!   <- ANIM:INHALE / ANIM:EXHALE   pushed on every cue change
//!   <- ERROR: UNKNOWN     for anything else

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use breath_core::BreathCue;
use crossbeam_channel as xch;
use eyre::WrapErr;

use crate::session_run::{RunOverrides, run_session};

/// Serve until the process-wide shutdown flag trips. One client at a time,
/// matching the original server.
pub fn serve(
    cfg: &breath_config::Config,
    bind: Option<&str>,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    let addr = bind.unwrap_or(&cfg.server.bind);
    let listener = TcpListener::bind(addr).wrap_err_with(|| format!("bind {addr}"))?;
    listener
        .set_nonblocking(true)
        .wrap_err("set listener non-blocking")?;
    tracing::info!(%addr, "relay listening");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("relay shutting down");
            return Ok(());
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                tracing::info!(%peer, "display client connected");
                if let Err(e) = handle_client(stream, cfg, &shutdown) {
                    tracing::warn!(error = %e, "client session ended with error");
                }
                tracing::info!(%peer, "display client disconnected");
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => return Err(e).wrap_err("accept"),
        }
    }
}

/// A session running on a worker thread on behalf of one client.
struct RunningSession {
    stop: Arc<AtomicBool>,
    handle: std::thread::JoinHandle<()>,
    writer: std::thread::JoinHandle<()>,
}

impl RunningSession {
    fn spawn(cfg: &breath_config::Config, out: TcpStream) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_core = stop.clone();
        let cfg = cfg.clone();
        let (cue_tx, cue_rx) = xch::unbounded::<BreathCue>();

        let handle = std::thread::spawn(move || {
            let result = run_session(
                &cfg,
                &RunOverrides::default(),
                None,
                stop_for_core,
                move |report| {
                    if let Some(cue) = report.cue {
                        let _ = cue_tx.send(cue);
                    }
                },
            );
            match result {
                Ok(summary) => tracing::info!(
                    breaths = summary.breaths_detected,
                    final_target_s = summary.final_target_s,
                    "relayed session finished"
                ),
                Err(e) => tracing::error!(error = %e, "relayed session failed"),
            }
        });

        // Socket writes stay off the control loop thread; the channel
        // closes when the session thread drops its sender.
        let mut out = out;
        let writer = std::thread::spawn(move || {
            for cue in cue_rx {
                let line = format!("ANIM:{}\n", cue.label());
                if out.write_all(line.as_bytes()).is_err() {
                    break;
                }
                let _ = out.flush();
            }
        });

        Self {
            stop,
            handle,
            writer,
        }
    }

    fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
        let _ = self.writer.join();
    }

    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

fn handle_client(
    stream: TcpStream,
    cfg: &breath_config::Config,
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<()> {
    stream
        .set_read_timeout(Some(Duration::from_millis(200)))
        .wrap_err("set read timeout")?;
    let mut reply_stream = stream.try_clone().wrap_err("clone stream")?;
    let mut reader = BufReader::new(stream);

    let mut session: Option<RunningSession> = None;
    let mut line = String::new();

    let result = loop {
        if shutdown.load(Ordering::Relaxed) {
            break Ok(());
        }
        // A timed-out read may leave a partial command in `line`; it is
        // completed by a later read, so only consumed lines are cleared.
        match reader.read_line(&mut line) {
            Ok(0) => break Ok(()), // client hung up
            Ok(_) => {
                let cmd = line.trim();
                let reply: &str = match cmd {
                    "" => "",
                    "RUN:FIX" => {
                        if let Some(s) = session.take() {
                            s.stop();
                        }
                        let out = reader.get_ref().try_clone().wrap_err("clone stream")?;
                        session = Some(RunningSession::spawn(cfg, out));
                        "OK: FIX_STARTED\n"
                    }
                    "STOP" => match session.take() {
                        Some(s) => {
                            s.stop();
                            "OK: STOPPED\n"
                        }
                        None => "INFO: NOTHING_RUNNING\n",
                    },
                    _ => "ERROR: UNKNOWN\n",
                };
                if !cmd.is_empty() {
                    tracing::debug!(cmd, "relay command");
                }
                line.clear();
                if !reply.is_empty() {
                    if reply_stream.write_all(reply.as_bytes()).is_err() {
                        break Ok(());
                    }
                    let _ = reply_stream.flush();
                }
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                // Reap a session that stopped on its own.
                if session.as_ref().is_some_and(RunningSession::is_finished)
                    && let Some(s) = session.take()
                {
                    s.stop();
                }
            }
            Err(e) => break Err(e).wrap_err("read command"),
        }
    };

    if let Some(s) = session.take() {
        s.stop();
    }
    result
}
