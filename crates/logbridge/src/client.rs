//! Client-side stdio bridge.
//!
//! Connects this process's stdin/stdout to a remote bridge over TCP so a
//! stdio-only MCP client can reach a server running on another machine. All
//! logging goes to stderr; stdout belongs to the carried protocol.

use tokio::net::TcpStream;
use tracing::info;

use logbridge_core::error::Result;

use crate::session::pump;

/// Bridge stdin/stdout to `host:port` until either direction ends.
pub async fn run(host: &str, port: u16) -> Result<()> {
    info!(host, port, "Connecting to remote bridge");
    let stream = TcpStream::connect((host, port)).await?;
    info!("Connected to remote bridge");

    let (remote_rd, remote_wr) = stream.into_split();
    let mut upstream = tokio::spawn(pump::run("stdin->remote", tokio::io::stdin(), remote_wr));
    let mut downstream = tokio::spawn(pump::run("remote->stdout", remote_rd, tokio::io::stdout()));

    // A stdio peer has no way to recover a half-open transport, so either
    // direction ending tears the whole bridge down.
    let summary = tokio::select! {
        res = &mut upstream => {
            downstream.abort();
            res.ok()
        }
        res = &mut downstream => {
            upstream.abort();
            res.ok()
        }
    };

    if let Some(summary) = summary {
        info!(
            label = summary.label,
            bytes = summary.bytes,
            frames = summary.frames,
            clean = summary.is_clean(),
            "Bridge connection closed"
        );
    }
    Ok(())
}
