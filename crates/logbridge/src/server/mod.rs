//! TCP listener and shutdown coordination.
//!
//! Accepts connections and starts one detached session per client; session
//! lifetimes are fully independent of the accept loop. The shutdown
//! coordinator stops the loop, signals every live session to drain, and
//! force-closes stragglers once the grace period elapses.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use logbridge_core::config::BridgeConfig;
use logbridge_core::error::{Error, Result};

use crate::session::{self, SessionRegistry};

/// Handle for requesting service shutdown from another task.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Request a graceful shutdown: stop accepting, drain live sessions.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// The bridge service: bound listener plus the registry of live sessions.
pub struct BridgeServer {
    config: BridgeConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    registry: SessionRegistry,
    shutdown_tx: watch::Sender<bool>,
}

impl BridgeServer {
    /// Bind the listener. Address conflicts and permission errors are fatal
    /// to the whole service.
    pub async fn bind(config: BridgeConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|e| Error::Bind {
                addr: config.bind_addr,
                source: e,
            })?;
        let local_addr = listener.local_addr().map_err(|e| Error::Bind {
            addr: config.bind_addr,
            source: e,
        })?;
        info!(addr = %local_addr, backend = %config.backend, "Bridge listening");

        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            config,
            listener,
            local_addr,
            registry: SessionRegistry::new(),
            shutdown_tx,
        })
    }

    /// Address actually bound (resolves port 0).
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle used to request a graceful shutdown.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Registry of live sessions.
    pub fn registry(&self) -> SessionRegistry {
        self.registry.clone()
    }

    /// Serve until shutdown is requested, then drain outstanding sessions.
    pub async fn serve(self) -> Result<()> {
        let Self {
            config,
            listener,
            registry,
            shutdown_tx,
            ..
        } = self;
        let mut shutdown_rx = shutdown_tx.subscribe();

        loop {
            tokio::select! {
                _ = async {
                    let _ = shutdown_rx.wait_for(|&stop| stop).await;
                } => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let id = Uuid::new_v4();
                            info!(session = %id, peer = %peer, "Accepted connection");
                            let session_config = config.clone();
                            let session_registry = registry.clone();
                            let session_shutdown = shutdown_tx.subscribe();
                            let handle = tokio::spawn(async move {
                                if let Err(e) =
                                    session::run(id, stream, &session_config, session_shutdown)
                                        .await
                                {
                                    warn!(session = %id, error = %e, "Session ended with error");
                                }
                                session_registry.unregister(id).await;
                            });
                            registry.register(id, handle).await;
                        }
                        Err(e) => {
                            // Transient accept failures (e.g. fd exhaustion)
                            // must not kill the service.
                            warn!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        drop(listener);
        let forced = registry.drain(config.grace).await;
        if forced > 0 {
            let err = Error::ShutdownTimeout { forced };
            warn!(error = %err, "Forced session teardown during shutdown");
        }
        info!("Bridge stopped");
        Ok(())
    }
}
