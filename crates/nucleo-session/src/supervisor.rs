//! Session Supervisor
//!
//! Runs the poll driver and the delivery bridge as separate tasks over one
//! shared assembler and connection. Whichever task finishes first decides
//! the session outcome; the other is cancelled and the handoff channel is
//! closed.

use crate::bridge::{BridgeExit, DeliveryBridge};
use crate::error::SessionError;
use crate::handoff::{handoff_channel, HandoffReceiver, HandoffSender, HandoffStats};
use crate::poll::PollDriver;
use crate::settings::SessionConfig;
use crate::signal::TerminationSignal;
use nucleo_protocol::{open_serial, Connection, SharedAssembler};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// How a session ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The termination signal stopped the poll driver
    Stopped {
        /// Requests issued before stopping
        cycles: u64,
    },
    /// The device side of the transport closed
    TransportClosed,
    /// The consumer dropped its receiver
    ConsumerGone,
}

/// Summary returned when a session ends cleanly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub stats: HandoffStats,
}

/// Owns one poll/delivery session
pub struct SessionSupervisor {
    config: SessionConfig,
    stop: TerminationSignal,
    sender: HandoffSender,
}

impl SessionSupervisor {
    /// Create a supervisor and the receiver its frames will arrive on
    pub fn new(config: SessionConfig) -> (Self, HandoffReceiver) {
        let (sender, receiver) = handoff_channel(config.handoff_timeout());
        let supervisor = Self {
            config,
            stop: TerminationSignal::new(),
            sender,
        };
        (supervisor, receiver)
    }

    /// Handle for requesting a stop from outside the session
    pub fn termination_signal(&self) -> TerminationSignal {
        self.stop.clone()
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open the configured serial port and run the session on it
    pub async fn run_serial(self) -> Result<SessionReport, SessionError> {
        let (reader, connection) = open_serial(&self.config.serial)?;
        self.run(reader, connection).await
    }

    /// Run the session over an already opened transport
    pub async fn run<R, W>(self, reader: R, connection: Connection<W>) -> Result<SessionReport, SessionError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        info!("Starting telemetry session");

        let assembler = SharedAssembler::new();
        let connection = Arc::new(Mutex::new(connection));

        let poll = PollDriver::new(
            self.config.poll.clone(),
            assembler.clone(),
            connection.clone(),
            self.stop.clone(),
        );
        let bridge = DeliveryBridge::new(reader, assembler, connection, self.sender.clone())
            .with_read_buffer(self.config.read_buffer);

        let mut poll_task = tokio::spawn(poll.run());
        let mut bridge_task = tokio::spawn(bridge.run());

        let result = tokio::select! {
            joined = &mut poll_task => {
                cancel(bridge_task).await;
                flatten(joined).map(|cycles| SessionOutcome::Stopped { cycles })
            }
            joined = &mut bridge_task => {
                cancel(poll_task).await;
                flatten(joined).map(|exit| match exit {
                    BridgeExit::TransportClosed => SessionOutcome::TransportClosed,
                    BridgeExit::ConsumerGone => SessionOutcome::ConsumerGone,
                })
            }
        };

        let stats = self.sender.stats();
        self.sender.close();

        match result {
            Ok(outcome) => {
                info!(
                    "Session ended: {:?} ({} frames delivered, {} dropped)",
                    outcome, stats.delivered, stats.dropped
                );
                Ok(SessionReport { outcome, stats })
            }
            Err(err) => {
                error!("Session failed: {}", err);
                Err(err)
            }
        }
    }
}

/// Abort a task and wait until it has been torn down
async fn cancel<T>(task: JoinHandle<T>) {
    task.abort();
    // A cancellation error is the expected result here
    let _ = task.await;
}

fn flatten<T>(joined: Result<Result<T, SessionError>, tokio::task::JoinError>) -> Result<T, SessionError> {
    joined?
}
