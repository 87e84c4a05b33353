//! Connection manager with infinite fixed-backoff connect.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{ConnectionState, LinkError, LinkOpener, LinkSettings, SerialLink};

/// Owns the single device link and its lifecycle.
pub struct ConnectionManager {
    opener: Box<dyn LinkOpener>,
    settings: LinkSettings,
    retry_backoff: Duration,
    state: ConnectionState,
    link: Option<Box<dyn SerialLink>>,
    /// Successful connects since creation
    connections: u64,
}

impl ConnectionManager {
    pub fn new(opener: Box<dyn LinkOpener>, settings: LinkSettings, retry_backoff: Duration) -> Self {
        Self {
            opener,
            settings,
            retry_backoff,
            state: ConnectionState::Disconnected,
            link: None,
            connections: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state == ConnectionState::Connected && self.link.is_some()
    }

    pub fn connections(&self) -> u64 {
        self.connections
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Connection state change");
            self.state = next;
        }
    }

    /// Open the device, retrying forever with a fixed backoff.
    ///
    /// Only returns an error when `cancel` fires, in which case no link is
    /// held afterwards.
    pub async fn connect(&mut self, cancel: &CancellationToken) -> Result<(), LinkError> {
        self.link = None;
        self.transition(ConnectionState::Connecting);

        let mut attempt: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                self.transition(ConnectionState::Disconnected);
                return Err(LinkError::Cancelled);
            }

            attempt += 1;
            match self.opener.open(&self.settings) {
                Ok(link) => {
                    info!(
                        port = %self.settings.port,
                        baud_rate = self.settings.baud_rate,
                        attempt,
                        "Connected to serial device"
                    );
                    self.link = Some(link);
                    self.connections += 1;
                    self.transition(ConnectionState::Connected);
                    return Ok(());
                }
                Err(e) => {
                    error!(
                        port = %self.settings.port,
                        attempt,
                        error = %e,
                        retry_in_secs = self.retry_backoff.as_secs_f64(),
                        "Failed to connect to serial device, retrying"
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    self.transition(ConnectionState::Disconnected);
                    return Err(LinkError::Cancelled);
                }
                _ = tokio::time::sleep(self.retry_backoff) => {}
            }
        }
    }

    /// Non-blocking availability check on the open link.
    pub fn has_data(&mut self) -> Result<bool, LinkError> {
        let result = self.link_mut()?.has_data();
        self.observe(result)
    }

    pub async fn read_line(&mut self) -> Result<Option<String>, LinkError> {
        let result = self.link_mut()?.read_line().await;
        self.observe(result)
    }

    pub async fn write_line(&mut self, text: &str) -> Result<(), LinkError> {
        let result = self.link_mut()?.write_line(text).await;
        self.observe(result)
    }

    /// Drop the link, if any.
    pub fn close(&mut self) {
        if let Some(link) = self.link.take() {
            info!(port = %link.name(), "Serial connection closed");
        }
        self.transition(ConnectionState::Disconnected);
    }

    fn link_mut(&mut self) -> Result<&mut Box<dyn SerialLink>, LinkError> {
        self.link.as_mut().ok_or(LinkError::NotConnected)
    }

    /// Move to `Failed` and release the link on a transport disconnect.
    fn observe<T>(&mut self, result: Result<T, LinkError>) -> Result<T, LinkError> {
        if let Err(LinkError::Disconnected(reason)) = &result {
            error!(port = %self.settings.port, reason = %reason, "Serial device lost");
            self.link = None;
            self.transition(ConnectionState::Failed);
        }
        result
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("port", &self.settings.port)
            .field("state", &self.state)
            .field("connections", &self.connections)
            .finish()
    }
}
