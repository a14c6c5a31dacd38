//! Serial Transport
//!
//! Opens the board's USB CDC port and splits it into the read half used by
//! the reception loop and the write side wrapped in a [`Connection`].

use crate::connection::Connection;
use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use tokio::io::{ReadHalf, WriteHalf};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::info;

/// Default device path of the board's virtual COM port
pub const DEFAULT_DEVICE: &str = "/dev/ttyACM0";

/// Default baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Serial port settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path (e.g. "/dev/ttyACM0" or "COM3")
    pub device: String,
    /// Baud rate
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// Read half of an open serial link
pub type SerialReader = ReadHalf<SerialStream>;

/// Write side of an open serial link
pub type SerialConnection = Connection<WriteHalf<SerialStream>>;

/// Open the serial port described by `config`
///
/// The returned connection is already in the connected state.
pub fn open_serial(config: &SerialConfig) -> Result<(SerialReader, SerialConnection), ProtocolError> {
    info!("Opening serial port {} at {} baud", config.device, config.baud_rate);

    let stream = tokio_serial::new(&config.device, config.baud_rate).open_native_async()?;
    let (reader, writer) = tokio::io::split(stream);

    Ok((reader, Connection::connected(writer)))
}
