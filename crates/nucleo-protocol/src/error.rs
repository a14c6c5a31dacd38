//! Telemetry Link Error Types

use thiserror::Error;

/// Errors that can occur on the serial telemetry link
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Write attempted while no transport is attached
    #[error("Telemetry link is not connected")]
    NotConnected,

    /// Serial port or transport I/O error
    #[error("Serial port error: {0}")]
    Serial(String),
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        ProtocolError::Serial(err.to_string())
    }
}

impl From<tokio_serial::Error> for ProtocolError {
    fn from(err: tokio_serial::Error) -> Self {
        ProtocolError::Serial(err.to_string())
    }
}
