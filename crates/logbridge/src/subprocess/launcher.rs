//! Backend process launcher.
//!
//! Spawns one MCP server process per session with freshly created, piped
//! stdio streams and handles termination during session teardown.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{info, warn};

use logbridge_core::config::BackendCommand;
use logbridge_core::error::{Error, Result};

/// The three pipe ends of a freshly spawned backend, handed to the session
/// exactly once.
#[derive(Debug)]
pub struct BackendIo {
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// A running backend process, owned by exactly one session.
#[derive(Debug)]
pub struct BackendProcess {
    child: Child,
}

impl BackendProcess {
    /// Spawn the backend with all three stdio streams piped.
    ///
    /// One OS process per call; a backend is never reused across sessions.
    pub fn spawn(command: &BackendCommand) -> Result<(Self, BackendIo)> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A force-aborted session task must not leave its backend behind.
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| Error::Spawn {
            command: command.to_string(),
            source: e,
        })?;

        let io = BackendIo {
            stdin: take_stream(child.stdin.take(), command, "stdin")?,
            stdout: take_stream(child.stdout.take(), command, "stdout")?,
            stderr: take_stream(child.stderr.take(), command, "stderr")?,
        };

        info!(pid = child.id(), backend = %command, "Spawned backend process");
        Ok((Self { child }, io))
    }

    /// OS process id, until the process has been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the backend to exit on its own.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Terminate the backend: SIGTERM (unix), bounded wait, then SIGKILL.
    ///
    /// Returns the observed exit status when one could be collected. The
    /// status is logged for diagnostics only and never re-interpreted.
    pub async fn terminate(mut self, grace: Duration) -> Option<ExitStatus> {
        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            // SAFETY: pid is a valid process ID obtained from our own Child
            // handle. kill(2) with SIGTERM is safe to call on an owned
            // subprocess.
            #[allow(unsafe_code)]
            #[allow(clippy::cast_possible_wrap)]
            let ret = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
            if ret != 0 {
                let err = std::io::Error::last_os_error();
                warn!(pid, error = %err, "Failed to send SIGTERM to backend");
            }
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!(?status, "Backend exited within grace period");
                Some(status)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Error waiting for backend exit, killing");
                self.child.kill().await.ok();
                None
            }
            Err(_) => {
                warn!("Backend did not exit within grace period, killing");
                self.child.kill().await.ok();
                self.child.wait().await.ok()
            }
        }
    }
}

fn take_stream<T>(stream: Option<T>, command: &BackendCommand, name: &str) -> Result<T> {
    stream.ok_or_else(|| Error::Spawn {
        command: command.to_string(),
        source: std::io::Error::other(format!("failed to capture {name}")),
    })
}
