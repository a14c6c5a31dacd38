//! Connection Lifecycle Adapter
//!
//! Tracks whether a transport is attached and guards writes to it.

use crate::error::ProtocolError;
use crate::REQUEST_FRAME;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Link state as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport attached (initial state, and after loss)
    Disconnected,
    /// Transport attached and writable
    Connected,
}

/// Write side of the telemetry link
pub struct Connection<W> {
    /// Transport writer, present only while connected
    writer: Option<W>,
}

impl<W> Connection<W>
where
    W: AsyncWrite + Unpin,
{
    /// Create a connection with no transport attached
    pub fn new() -> Self {
        Self { writer: None }
    }

    /// Create a connection that is already attached to `writer`
    pub fn connected(writer: W) -> Self {
        let mut connection = Self::new();
        connection.connection_made(writer);
        connection
    }

    /// Attach a transport
    pub fn connection_made(&mut self, writer: W) {
        debug!("Connection made");
        self.writer = Some(writer);
    }

    /// Detach the transport, optionally recording why
    pub fn connection_lost(&mut self, reason: Option<&ProtocolError>) {
        if self.writer.take().is_some() {
            match reason {
                Some(err) => warn!("Connection lost: {}", err),
                None => debug!("Connection lost"),
            }
        }
    }

    /// Current link state
    pub fn state(&self) -> ConnectionState {
        if self.writer.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Check if a transport is attached
    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    /// Write raw bytes to the device
    ///
    /// A failed write detaches the transport, so later calls report
    /// [`ProtocolError::NotConnected`].
    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let writer = self.writer.as_mut().ok_or(ProtocolError::NotConnected)?;

        let result = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        }
        .await;

        if let Err(err) = result {
            let err = ProtocolError::from(err);
            self.connection_lost(Some(&err));
            return Err(err);
        }
        Ok(())
    }

    /// Ask the device for its next frame
    pub async fn request_frame(&mut self) -> Result<(), ProtocolError> {
        debug!("Requesting frame");
        self.write(&[REQUEST_FRAME]).await
    }
}

impl<W> Default for Connection<W>
where
    W: AsyncWrite + Unpin,
{
    fn default() -> Self {
        Self::new()
    }
}
