//! Session Error Types

use nucleo_protocol::ProtocolError;
use thiserror::Error;

/// Errors that end a telemetry session
#[derive(Debug, Error)]
pub enum SessionError {
    /// Link failure from the poll or reception side
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A session task panicked or was cancelled unexpectedly
    #[error("Session task failed: {0}")]
    TaskFailed(String),
}

impl From<tokio::task::JoinError> for SessionError {
    fn from(err: tokio::task::JoinError) -> Self {
        SessionError::TaskFailed(err.to_string())
    }
}
