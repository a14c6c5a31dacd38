//! Nucleo Telemetry Protocol
//!
//! This crate decodes the fixed 8-byte telemetry frame sent by the sensor
//! board over a half-duplex serial link and manages the write side of that
//! link.

mod assembler;
mod connection;
mod error;
mod frame;
mod serial;

pub use assembler::{FrameAssembler, SharedAssembler};
pub use connection::{Connection, ConnectionState};
pub use error::ProtocolError;
pub use frame::{Frame, FrameSnapshot, FRAME_LEN, UNSET_SENTINEL};
pub use serial::{open_serial, SerialConfig, SerialConnection, SerialReader};

/// Command byte that asks the board to transmit one frame
pub const REQUEST_FRAME: u8 = 0x01;
