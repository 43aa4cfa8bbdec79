//! Connection session: one network client wired to one backend process.
//!
//! A session owns exactly one `TcpStream` and one [`BackendProcess`] and is
//! live while both are open. It moves through four phases:
//!
//! * starting -- backend spawn; a spawn failure closes the connection with no
//!   bytes exchanged
//! * active -- two data pumps plus the stderr monitor run concurrently
//! * draining -- entered the instant any of {inbound pump, outbound pump,
//!   backend exit, shutdown signal} fires; the surviving pump is cancelled
//!   and the backend is terminated within the grace period
//! * closed -- all tasks joined, backend reaped, socket released
//!
//! A stdio backend cannot signal "one direction is broken but I am fine", so
//! any single termination drains the whole session.

pub mod pump;
pub mod registry;

use std::process::ExitStatus;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::ChildStderr;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use logbridge_core::config::BridgeConfig;
use logbridge_core::error::{Error, Result};

use crate::subprocess::BackendProcess;
use pump::{PumpOutcome, PumpSummary};

pub use registry::SessionRegistry;

/// Window granted to the stderr monitor to drain the tail of the pipe after
/// the backend is gone.
const STDERR_DRAIN_WINDOW: Duration = Duration::from_secs(1);

/// What moved the session out of its active phase.
enum DrainCause {
    Inbound(Option<PumpSummary>),
    Outbound(Option<PumpSummary>),
    BackendExit(std::io::Result<ExitStatus>),
    Shutdown,
}

/// Run one session to completion.
///
/// Errors are contained to this session: the caller logs them and the
/// listener keeps serving other connections.
pub async fn run(
    id: Uuid,
    stream: TcpStream,
    config: &BridgeConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let (mut backend, io) = BackendProcess::spawn(&config.backend)?;
    let (client_rd, client_wr) = stream.into_split();

    let mut inbound = tokio::spawn(pump::run("client->backend", client_rd, io.stdin));
    let mut outbound = tokio::spawn(pump::run("backend->client", io.stdout, client_wr));
    let mut monitor = tokio::spawn(monitor_stderr(id, io.stderr, config.log_backend_stderr));

    let cause = tokio::select! {
        res = &mut inbound => DrainCause::Inbound(res.ok()),
        res = &mut outbound => DrainCause::Outbound(res.ok()),
        status = backend.wait() => DrainCause::BackendExit(status),
        _ = shutdown_rx.wait_for(|&stop| stop) => DrainCause::Shutdown,
    };

    let mut backend_exited = false;
    match cause {
        DrainCause::Inbound(summary) => {
            log_pump(id, summary);
            outbound.abort();
            let _ = outbound.await;
        }
        DrainCause::Outbound(summary) => {
            log_pump(id, summary);
            inbound.abort();
            let _ = inbound.await;
        }
        DrainCause::BackendExit(status) => {
            backend_exited = true;
            log_backend_exit(id, status);
            // Deliver whatever the backend wrote before exiting; its stdout
            // pipe reaches end-of-stream now that the process is gone.
            match tokio::time::timeout(config.grace, &mut outbound).await {
                Ok(res) => log_pump(id, res.ok()),
                Err(_) => {
                    outbound.abort();
                    let _ = outbound.await;
                }
            }
            inbound.abort();
            let _ = inbound.await;
        }
        DrainCause::Shutdown => {
            info!(session = %id, "Draining on service shutdown");
            inbound.abort();
            outbound.abort();
            let _ = inbound.await;
            let _ = outbound.await;
        }
    }

    if !backend_exited {
        if let Some(status) = backend.terminate(config.grace).await {
            debug!(session = %id, ?status, "Backend terminated during teardown");
        }
    }

    if tokio::time::timeout(STDERR_DRAIN_WINDOW, &mut monitor)
        .await
        .is_err()
    {
        monitor.abort();
    }

    info!(session = %id, "Session closed");
    Ok(())
}

/// Drain the backend's stderr, forwarding each complete line to the service
/// log tagged with the session id.
///
/// The stream is drained even when forwarding is disabled so a chatty backend
/// can never block on a full stderr pipe.
async fn monitor_stderr(id: Uuid, stderr: ChildStderr, log_lines: bool) {
    let reader = BufReader::new(stderr);
    let mut lines = reader.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if log_lines {
            warn!(session = %id, "backend stderr: {}", line);
        } else {
            debug!(session = %id, "backend stderr: {}", line);
        }
    }
    debug!(session = %id, "Stderr monitor finished");
}

fn log_pump(id: Uuid, summary: Option<PumpSummary>) {
    let Some(summary) = summary else {
        warn!(session = %id, "Pump task failed");
        return;
    };
    match summary.outcome {
        PumpOutcome::Eof => {
            info!(
                session = %id,
                label = summary.label,
                bytes = summary.bytes,
                frames = summary.frames,
                "Stream reached end-of-stream"
            );
        }
        PumpOutcome::ReadError(source) | PumpOutcome::WriteError(source) => {
            let err = Error::Stream {
                label: summary.label,
                source,
            };
            warn!(session = %id, bytes = summary.bytes, error = %err, "Stream failed");
        }
    }
}

fn log_backend_exit(id: Uuid, status: std::io::Result<ExitStatus>) {
    match status {
        Ok(status) if status.success() => {
            info!(session = %id, "Backend exited");
        }
        Ok(status) => {
            let err = Error::BackendExit { status };
            warn!(session = %id, error = %err, "Backend exited abnormally");
        }
        Err(e) => {
            warn!(session = %id, error = %e, "Failed to observe backend exit");
        }
    }
}
