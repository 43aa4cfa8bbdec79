//! logbridge core library
//!
//! Shared functionality for the bridge binary:
//! - Configuration resolved once at startup
//! - Error taxonomy for bind/spawn/stream/teardown failures
//! - Tracing initialisation

pub mod config;
pub mod error;
pub mod tracing_init;

pub use config::{BackendCommand, BridgeConfig};
pub use error::{Error, Result};
