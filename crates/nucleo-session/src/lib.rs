//! Nucleo Telemetry Session
//!
//! Pairs a periodic frame-request loop with a reception loop that decodes
//! frames and hands them to a consumer over a lossy single-slot channel.

mod bridge;
mod error;
mod handoff;
mod poll;
mod settings;
mod signal;
mod supervisor;

pub use bridge::{BridgeExit, DeliveryBridge, DEFAULT_READ_BUFFER};
pub use error::SessionError;
pub use handoff::{
    handoff_channel, ChannelClosed, HandoffReceiver, HandoffSender, HandoffStats, PutOutcome,
    DEFAULT_PUT_TIMEOUT,
};
pub use poll::{PollConfig, PollDriver, DIAGNOSTIC_INTERVAL_MS, HIGH_RATE_INTERVAL_MS};
pub use settings::{SessionConfig, ENV_PREFIX};
pub use signal::TerminationSignal;
pub use supervisor::{SessionOutcome, SessionReport, SessionSupervisor};

use nucleo_protocol::Connection;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Connection shared between the poll and reception tasks
pub type SharedConnection<W> = Arc<Mutex<Connection<W>>>;
