//! Device Connection
//!
//! The bridge talks to exactly one line-oriented serial device. The transport
//! sits behind two traits so the read loop can run against real hardware or
//! an in-memory script:
//!
//! - [`SerialLink`]: an open link (availability check, line read, line write)
//! - [`LinkOpener`]: opens a link for a port/baud/timeout triple
//!
//! [`ConnectionManager`] owns the link and drives the
//! [`ConnectionState`] machine, including the infinite fixed-backoff connect.

mod manager;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
mod serial;

pub use manager::ConnectionManager;
pub use serial::{list_ports, SerialPortLink, SerialPortOpener};

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("failed to open {port}: {reason}")]
    Open { port: String, reason: String },

    #[error("device disconnected: {0}")]
    Disconnected(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("no open connection")]
    NotConnected,

    #[error("connect cancelled")]
    Cancelled,
}

/// Parameters for opening a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

/// Connection lifecycle.
///
/// ```text
/// Disconnected --connect()--> Connecting --ok--> Connected
/// Connecting --err--> Connecting (after backoff)
/// Connected --transport failure--> Failed --connect()--> Connecting
/// any --close()--> Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// An open, line-oriented device link.
#[async_trait]
pub trait SerialLink: Send {
    /// Non-blocking check for pending input.
    ///
    /// Returns `Err(LinkError::Disconnected)` when the device is gone.
    fn has_data(&mut self) -> Result<bool, LinkError>;

    /// Read one newline-terminated record, decoded lossily and trimmed.
    ///
    /// `Ok(None)` on read timeout or an empty line.
    async fn read_line(&mut self) -> Result<Option<String>, LinkError>;

    /// Write one record, appending the newline if missing, and flush.
    async fn write_line(&mut self, text: &str) -> Result<(), LinkError>;

    /// Human-readable name for logging (usually the device path).
    fn name(&self) -> &str;
}

/// Factory for links, retried by [`ConnectionManager::connect`].
pub trait LinkOpener: Send + Sync {
    fn open(&self, settings: &LinkSettings) -> Result<Box<dyn SerialLink>, LinkError>;
}
