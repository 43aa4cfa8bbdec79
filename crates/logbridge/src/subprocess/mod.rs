//! Backend subprocess lifecycle.

pub mod launcher;

pub use launcher::{BackendIo, BackendProcess};
