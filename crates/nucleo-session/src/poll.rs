//! Frame Request Polling

use crate::error::SessionError;
use crate::signal::TerminationSignal;
use crate::SharedConnection;
use nucleo_protocol::{ProtocolError, SharedAssembler};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};

/// Poll interval for live monitoring
pub const HIGH_RATE_INTERVAL_MS: u64 = 50;

/// Poll interval for low-rate diagnostic logging
pub const DIAGNOSTIC_INTERVAL_MS: u64 = 500;

/// Configuration for the poll driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Time between request commands in milliseconds
    pub interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::high_rate()
    }
}

impl PollConfig {
    /// 20 Hz polling for live display
    pub fn high_rate() -> Self {
        Self {
            interval_ms: HIGH_RATE_INTERVAL_MS,
        }
    }

    /// 2 Hz polling for diagnostics
    pub fn diagnostic() -> Self {
        Self {
            interval_ms: DIAGNOSTIC_INTERVAL_MS,
        }
    }

    /// Time between request commands
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Periodically asks the board for a new frame
pub struct PollDriver<W> {
    config: PollConfig,
    assembler: SharedAssembler,
    connection: SharedConnection<W>,
    stop: TerminationSignal,
}

impl<W> PollDriver<W>
where
    W: AsyncWrite + Unpin,
{
    /// Create a poll driver over a shared assembler and connection
    pub fn new(
        config: PollConfig,
        assembler: SharedAssembler,
        connection: SharedConnection<W>,
        stop: TerminationSignal,
    ) -> Self {
        Self {
            config,
            assembler,
            connection,
            stop,
        }
    }

    /// Run the request loop until the termination signal is set
    ///
    /// The signal is checked once per cycle, before the request; a sleep in
    /// progress always runs to completion. Returns the number of requests
    /// issued.
    pub async fn run(self) -> Result<u64, SessionError> {
        info!("Starting poll driver at {:?} interval", self.config.interval());
        let mut cycles = 0u64;

        while !self.stop.is_set() {
            self.assembler.clear();

            {
                let mut connection = self.connection.lock().await;
                if !connection.is_connected() {
                    warn!("Link disconnected, suspending requests after {} cycles", cycles);
                    return Err(ProtocolError::NotConnected.into());
                }
                connection.request_frame().await?;
            }

            cycles += 1;
            debug!("Poll cycle {} sent", cycles);
            tokio::time::sleep(self.config.interval()).await;
        }

        info!("Poll driver stopped after {} cycles", cycles);
        Ok(cycles)
    }
}
