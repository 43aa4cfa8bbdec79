//! logbridge library
//!
//! Building blocks for the bridge binary:
//! - Backend subprocess lifecycle
//! - Per-connection sessions (data pumps, stderr monitor, teardown)
//! - TCP listener and shutdown coordination
//! - Client-side stdio bridge and handshake probe

pub mod client;
pub mod probe;
pub mod server;
pub mod session;
pub mod subprocess;
