//! MCP handshake probe.
//!
//! Connects to a running bridge, performs the JSON-RPC initialize handshake,
//! and lists the server's tools. Used to verify a deployment end to end; the
//! report is the command's stdout.

#![allow(clippy::print_stdout)]

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::time::timeout;

use logbridge_core::error::Result;

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    params: Value,
}

/// Run the handshake probe against `host:port`.
pub async fn run(host: &str, port: u16, reply_timeout: Duration) -> Result<()> {
    let stream = TcpStream::connect((host, port)).await?;
    let (rd, mut wr) = stream.into_split();
    let mut lines = BufReader::new(rd).lines();

    send(
        &mut wr,
        &RpcRequest {
            jsonrpc: "2.0",
            id: Some(1),
            method: "initialize",
            params: serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {
                    "name": "logbridge-probe",
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        },
    )
    .await?;
    let reply = read_reply(&mut lines, reply_timeout, 1).await?;
    let server_info = reply
        .pointer("/result/serverInfo")
        .cloned()
        .unwrap_or(Value::Null);
    println!("server: {server_info}");

    send(
        &mut wr,
        &RpcRequest {
            jsonrpc: "2.0",
            id: None,
            method: "notifications/initialized",
            params: serde_json::json!({}),
        },
    )
    .await?;

    send(
        &mut wr,
        &RpcRequest {
            jsonrpc: "2.0",
            id: Some(2),
            method: "tools/list",
            params: serde_json::json!({}),
        },
    )
    .await?;
    let reply = read_reply(&mut lines, reply_timeout, 2).await?;
    if let Some(tools) = reply.pointer("/result/tools").and_then(Value::as_array) {
        println!("tools: {}", tools.len());
        for tool in tools {
            if let Some(name) = tool.get("name").and_then(Value::as_str) {
                println!("  - {name}");
            }
        }
    }

    println!("ok");
    Ok(())
}

async fn send<W>(wr: &mut W, request: &RpcRequest<'_>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(request)?;
    line.push(b'\n');
    wr.write_all(&line).await?;
    wr.flush().await?;
    Ok(())
}

/// Read lines until the response carrying `id` arrives, skipping
/// notifications the server may interleave.
async fn read_reply(
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
    reply_timeout: Duration,
    id: u64,
) -> Result<Value> {
    loop {
        let line = timeout(reply_timeout, lines.next_line())
            .await
            .map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no reply to request {id}"),
                )
            })??;
        let Some(line) = line else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("connection closed before reply to request {id}"),
            )
            .into());
        };
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)?;
        if value.get("id").and_then(Value::as_u64) == Some(id) {
            return Ok(value);
        }
    }
}
