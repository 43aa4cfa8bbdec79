//! logbridge
//!
//! Makes a stdio MCP server reachable over TCP, one isolated backend process
//! per client connection, plus client-side helpers for reaching a remote
//! bridge (`connect`) and checking one end to end (`probe`).

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use logbridge::server::BridgeServer;
use logbridge::{client, probe};
use logbridge_core::config::{BackendCommand, BridgeConfig};
use logbridge_core::tracing_init::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "logbridge")]
#[command(version, about = "TCP bridge for stdio MCP servers")]
struct Cli {
    /// Log level filter (e.g. "info", "debug", "warn").
    #[arg(long, default_value = "info", env = "LOGBRIDGE_LOG_LEVEL", global = true)]
    log_level: String,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "LOGBRIDGE_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Serve a stdio MCP server to TCP clients, one backend per connection.
    Serve {
        /// Host to bind.
        #[arg(long, default_value = "127.0.0.1", env = "LOGBRIDGE_HOST")]
        host: IpAddr,

        /// Port to bind.
        #[arg(long, default_value_t = 8080, env = "LOGBRIDGE_PORT")]
        port: u16,

        /// Seconds to wait for backend exit before force-killing it.
        #[arg(long, default_value_t = 5, env = "LOGBRIDGE_GRACE_SECS")]
        grace_secs: u64,

        /// Do not forward backend stderr lines to the service log.
        #[arg(long, env = "LOGBRIDGE_QUIET_BACKEND")]
        quiet_backend: bool,

        /// Backend command to spawn per connection, after `--`
        /// (e.g. `logbridge serve -- mcp-log-analyzer --stdio`).
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        backend: Vec<String>,
    },
    /// Bridge this process's stdin/stdout to a remote bridge.
    Connect {
        /// Remote host.
        host: String,
        /// Remote port.
        port: u16,
    },
    /// Check that a running bridge answers the MCP handshake.
    Probe {
        /// Host to connect to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to connect to.
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Seconds to wait for each response line.
        #[arg(long, default_value_t = 5)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("logbridge={}", cli.log_level);
    init_tracing(&log_filter, cli.log_json);

    match cli.command {
        CliCommand::Serve {
            host,
            port,
            grace_secs,
            quiet_backend,
            backend,
        } => serve(SocketAddr::new(host, port), grace_secs, quiet_backend, backend).await,
        CliCommand::Connect { host, port } => client::run(&host, port).await.map_err(Into::into),
        CliCommand::Probe {
            host,
            port,
            timeout_secs,
        } => probe::run(&host, port, Duration::from_secs(timeout_secs))
            .await
            .map_err(Into::into),
    }
}

async fn serve(
    addr: SocketAddr,
    grace_secs: u64,
    quiet_backend: bool,
    backend: Vec<String>,
) -> anyhow::Result<()> {
    let backend = BackendCommand::from_argv(backend)?;
    let config = BridgeConfig::new(addr, backend)
        .with_grace(Duration::from_secs(grace_secs))
        .with_backend_stderr(!quiet_backend);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.bind_addr,
        backend = %config.backend,
        grace_secs,
        "Starting logbridge"
    );

    let server = BridgeServer::bind(config).await?;
    let shutdown = server.shutdown_handle();

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    // Notify systemd that the bridge is ready to serve (unix only). The
    // `true` parameter unsets $NOTIFY_SOCKET so backend processes don't
    // accidentally notify systemd.
    #[cfg(unix)]
    sd_notify::notify(true, &[sd_notify::NotifyState::Ready])?;

    #[cfg(unix)]
    let sigterm_future = sigterm.recv();
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<Option<()>>();

    let mut serve_task = tokio::spawn(server.serve());

    tokio::select! {
        result = &mut serve_task => {
            result??;
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        _ = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
        }
    }

    shutdown.shutdown();
    serve_task.await??;

    info!("Bridge stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_args_are_well_formed() {
        Cli::command().debug_assert();
    }
}
