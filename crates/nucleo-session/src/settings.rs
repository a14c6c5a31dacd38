//! Session Configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `NUCLEO__*` environment variables (e.g. `NUCLEO__POLL__INTERVAL_MS=500`).

use crate::bridge::DEFAULT_READ_BUFFER;
use crate::error::SessionError;
use crate::handoff::DEFAULT_PUT_TIMEOUT;
use crate::poll::PollConfig;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use nucleo_protocol::SerialConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "NUCLEO";

/// Configuration for one telemetry session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Serial port settings
    pub serial: SerialConfig,
    /// Request cadence
    pub poll: PollConfig,
    /// How long a completed frame may wait for the consumer (milliseconds)
    pub handoff_timeout_ms: u64,
    /// Transport read buffer size in bytes
    pub read_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            poll: PollConfig::default(),
            handoff_timeout_ms: DEFAULT_PUT_TIMEOUT.as_millis() as u64,
            read_buffer: DEFAULT_READ_BUFFER,
        }
    }
}

impl SessionConfig {
    /// Low-rate profile for diagnostic logging
    pub fn diagnostic() -> Self {
        Self {
            poll: PollConfig::diagnostic(),
            ..Default::default()
        }
    }

    /// Bound on the handoff wait before a frame is dropped
    pub fn handoff_timeout(&self) -> Duration {
        Duration::from_millis(self.handoff_timeout_ms)
    }

    fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, SessionError> {
        Ok(Config::builder().add_source(Config::try_from(&SessionConfig::default())?))
    }

    /// Load defaults, an optional TOML file, and environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, SessionError> {
        let mut builder = Self::defaults()?;
        if let Some(path) = path {
            debug!("Loading session config from {}", path.display());
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Parse a TOML document layered over the defaults
    pub fn from_toml(source: &str) -> Result<Self, SessionError> {
        let config = Self::defaults()?
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }
}
