//! Bridge configuration, built once from CLI arguments at startup and
//! immutable for the process lifetime.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default wait for a backend to exit during teardown before it is killed.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Command line used to spawn one backend process per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl BackendCommand {
    /// Build from the trailing argv captured by the CLI.
    pub fn from_argv(argv: Vec<String>) -> Result<Self> {
        let mut argv = argv.into_iter();
        let program = argv
            .next()
            .ok_or_else(|| Error::Config("backend command must not be empty".into()))?;
        Ok(Self {
            program,
            args: argv.collect(),
        })
    }
}

impl fmt::Display for BackendCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Immutable service configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Address the listener binds.
    pub bind_addr: SocketAddr,
    /// Backend command spawned per accepted connection.
    pub backend: BackendCommand,
    /// Grace period for backend exit during teardown and service shutdown.
    pub grace: Duration,
    /// Forward backend stderr lines to the service log at warn level.
    pub log_backend_stderr: bool,
}

impl BridgeConfig {
    pub fn new(bind_addr: SocketAddr, backend: BackendCommand) -> Self {
        Self {
            bind_addr,
            backend,
            grace: DEFAULT_GRACE,
            log_backend_stderr: true,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn with_backend_stderr(mut self, enabled: bool) -> Self {
        self.log_backend_stderr = enabled;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn backend_command_from_argv() {
        let cmd = BackendCommand::from_argv(vec![
            "mcp-log-analyzer".into(),
            "--stdio".into(),
            "-v".into(),
        ])
        .unwrap();
        assert_eq!(cmd.program, "mcp-log-analyzer");
        assert_eq!(cmd.args, vec!["--stdio", "-v"]);
    }

    #[test]
    fn empty_argv_is_a_config_error() {
        let err = BackendCommand::from_argv(vec![]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn backend_command_display_joins_argv() {
        let cmd = BackendCommand::from_argv(vec!["python".into(), "main.py".into()]).unwrap();
        assert_eq!(cmd.to_string(), "python main.py");
    }

    #[test]
    fn config_defaults() {
        let cmd = BackendCommand::from_argv(vec!["cat".into()]).unwrap();
        let config = BridgeConfig::new("127.0.0.1:8080".parse().unwrap(), cmd);
        assert_eq!(config.grace, DEFAULT_GRACE);
        assert!(config.log_backend_stderr);

        let config = config
            .with_grace(Duration::from_secs(1))
            .with_backend_stderr(false);
        assert_eq!(config.grace, Duration::from_secs(1));
        assert!(!config.log_backend_stderr);
    }
}
