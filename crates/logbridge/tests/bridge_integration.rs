#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity
#![cfg(unix)]

//! Integration tests for the bridge: real TCP clients against real backend
//! processes (`cat`, `sh`), covering byte fidelity, session isolation,
//! teardown, and shutdown draining.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use logbridge::server::{BridgeServer, ShutdownHandle};
use logbridge::session::SessionRegistry;
use logbridge_core::config::{BackendCommand, BridgeConfig};
use logbridge_core::error::Result;

const TEST_GRACE: Duration = Duration::from_secs(2);
const WAIT: Duration = Duration::from_secs(5);

fn config_for(program: &str, args: &[&str]) -> BridgeConfig {
    BridgeConfig::new(
        "127.0.0.1:0".parse().unwrap(),
        BackendCommand {
            program: program.into(),
            args: args.iter().map(ToString::to_string).collect(),
        },
    )
    .with_grace(TEST_GRACE)
}

struct TestBridge {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    registry: SessionRegistry,
    task: JoinHandle<Result<()>>,
}

impl TestBridge {
    async fn start(config: BridgeConfig) -> Self {
        let server = BridgeServer::bind(config).await.unwrap();
        let addr = server.local_addr();
        let shutdown = server.shutdown_handle();
        let registry = server.registry();
        let task = tokio::spawn(server.serve());
        Self {
            addr,
            shutdown,
            registry,
            task,
        }
    }

    async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }

    async fn wait_for_sessions(&self, expected: usize) {
        for _ in 0..250 {
            if self.registry.session_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!(
            "session count never reached {expected}, still {}",
            self.registry.session_count().await
        );
    }

    async fn stop(self) {
        self.shutdown.shutdown();
        timeout(WAIT, self.task).await.unwrap().unwrap().unwrap();
    }
}

#[tokio::test]
async fn echo_scenario_round_trips_one_message() {
    let bridge = TestBridge::start(config_for("cat", &[])).await;

    let mut client = bridge.connect().await;
    let line = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\",\"params\":{}}\n";
    client.write_all(line).await.unwrap();

    let mut buf = vec![0u8; line.len()];
    timeout(WAIT, client.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(buf, line);

    drop(client);
    bridge.stop().await;
}

#[tokio::test]
async fn partial_frames_are_forwarded_without_waiting_for_a_newline() {
    let bridge = TestBridge::start(config_for("cat", &[])).await;

    let mut client = bridge.connect().await;
    client.write_all(b"abc").await.unwrap();

    let mut buf = [0u8; 3];
    timeout(WAIT, client.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"abc");

    drop(client);
    bridge.stop().await;
}

#[tokio::test]
async fn concurrent_sessions_get_independent_backends() {
    let bridge = TestBridge::start(config_for("cat", &[])).await;

    let mut first = bridge.connect().await;
    let mut second = bridge.connect().await;
    bridge.wait_for_sessions(2).await;

    first.write_all(b"{\"session\":\"a\"}\n").await.unwrap();
    second.write_all(b"{\"session\":\"b\"}\n").await.unwrap();

    let mut buf_a = vec![0u8; 16];
    timeout(WAIT, first.read_exact(&mut buf_a))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(buf_a, b"{\"session\":\"a\"}\n");

    let mut buf_b = vec![0u8; 16];
    timeout(WAIT, second.read_exact(&mut buf_b))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(buf_b, b"{\"session\":\"b\"}\n");

    drop(first);
    drop(second);
    bridge.stop().await;
}

#[tokio::test]
async fn client_disconnect_terminates_the_backend() {
    let bridge = TestBridge::start(config_for("cat", &[])).await;

    let client = bridge.connect().await;
    bridge.wait_for_sessions(1).await;
    drop(client);

    // The backend sees end-of-stream on stdin and the session closes without
    // leaking a process.
    bridge.wait_for_sessions(0).await;
    bridge.stop().await;
}

#[tokio::test]
async fn immediate_disconnect_without_data_closes_the_session() {
    let bridge = TestBridge::start(config_for("cat", &[])).await;

    let client = bridge.connect().await;
    drop(client);

    bridge.wait_for_sessions(0).await;
    bridge.stop().await;
}

#[tokio::test]
async fn backend_exit_closes_an_idle_client() {
    let bridge = TestBridge::start(config_for("sh", &["-c", "exit 7"])).await;

    let mut client = bridge.connect().await;
    let mut buf = [0u8; 1];
    let n = timeout(WAIT, client.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(n, 0, "client should observe EOF after backend exit");

    bridge.stop().await;
}

#[tokio::test]
async fn backend_output_before_exit_reaches_the_client() {
    let bridge = TestBridge::start(config_for("sh", &["-c", "echo hello"])).await;

    let mut client = bridge.connect().await;
    let mut data = Vec::new();
    timeout(WAIT, client.read_to_end(&mut data))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(data, b"hello\n");

    bridge.stop().await;
}

#[tokio::test]
async fn spawn_failure_rejects_only_that_connection() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("backend.sh");
    let bridge = TestBridge::start(config_for(&script.display().to_string(), &[])).await;

    // Executable does not exist yet: the connection is closed with no bytes
    // exchanged.
    let mut rejected = bridge.connect().await;
    let mut buf = [0u8; 1];
    let n = timeout(WAIT, rejected.read(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 0);

    // Once the cause is resolved the next connection succeeds.
    std::fs::write(&script, "#!/bin/sh\nexec cat\n").unwrap();
    let mut perms = std::fs::metadata(&script).unwrap().permissions();
    std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
    std::fs::set_permissions(&script, perms).unwrap();

    let mut client = bridge.connect().await;
    client.write_all(b"ping\n").await.unwrap();
    let mut buf = vec![0u8; 5];
    timeout(WAIT, client.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(buf, b"ping\n");

    drop(client);
    bridge.stop().await;
}

#[tokio::test]
async fn shutdown_drains_live_sessions_and_closes_clients() {
    let bridge = TestBridge::start(config_for("cat", &[])).await;

    let mut client = bridge.connect().await;
    bridge.wait_for_sessions(1).await;

    bridge.shutdown.shutdown();
    timeout(WAIT, bridge.task).await.unwrap().unwrap().unwrap();

    let mut buf = [0u8; 1];
    let n = timeout(WAIT, client.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(n, 0, "client socket should close during shutdown");
}

#[tokio::test]
async fn byte_fidelity_across_multiple_messages() {
    let bridge = TestBridge::start(config_for("cat", &[])).await;

    let mut client = bridge.connect().await;
    let mut sent = Vec::new();
    for i in 0..50 {
        let line = format!("{{\"jsonrpc\":\"2.0\",\"id\":{i},\"method\":\"ping\",\"params\":{{}}}}\n");
        client.write_all(line.as_bytes()).await.unwrap();
        sent.extend_from_slice(line.as_bytes());
    }

    let mut received = vec![0u8; sent.len()];
    timeout(WAIT, client.read_exact(&mut received))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, sent);

    drop(client);
    bridge.stop().await;
}
