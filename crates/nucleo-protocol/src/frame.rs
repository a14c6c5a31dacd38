//! Telemetry Frame Definitions
//!
//! A frame is four little-endian 16-bit values sent back-to-back by the
//! board after each request command.

use serde::{Deserialize, Serialize};

/// Number of bytes in one wire frame
pub const FRAME_LEN: usize = 8;

/// Value reported for a field that has not received any byte yet
pub const UNSET_SENTINEL: i32 = -1;

/// A complete telemetry frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    /// First flex sensor reading
    pub flex1: u16,
    /// Second flex sensor reading
    pub flex2: u16,
    /// Current sense reading
    pub current: u16,
    /// Voltage sense reading
    pub voltage: u16,
}

impl Frame {
    /// Create a frame from its four field values
    pub fn new(flex1: u16, flex2: u16, current: u16, voltage: u16) -> Self {
        Self {
            flex1,
            flex2,
            current,
            voltage,
        }
    }

    /// Decode a frame from its wire representation
    pub fn from_bytes(bytes: &[u8; FRAME_LEN]) -> Self {
        Self {
            flex1: u16::from_le_bytes([bytes[0], bytes[1]]),
            flex2: u16::from_le_bytes([bytes[2], bytes[3]]),
            current: u16::from_le_bytes([bytes[4], bytes[5]]),
            voltage: u16::from_le_bytes([bytes[6], bytes[7]]),
        }
    }

    /// Encode the frame in wire order
    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        let mut out = [0u8; FRAME_LEN];
        out[0..2].copy_from_slice(&self.flex1.to_le_bytes());
        out[2..4].copy_from_slice(&self.flex2.to_le_bytes());
        out[4..6].copy_from_slice(&self.current.to_le_bytes());
        out[6..8].copy_from_slice(&self.voltage.to_le_bytes());
        out
    }
}

/// Copy of an in-progress frame
///
/// Fields that have not seen a byte since the last clear are `None`. A field
/// whose low byte arrived but whose high byte has not yet is `Some` with the
/// partial value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameSnapshot {
    /// First flex sensor reading, if started
    pub flex1: Option<u16>,
    /// Second flex sensor reading, if started
    pub flex2: Option<u16>,
    /// Current sense reading, if started
    pub current: Option<u16>,
    /// Voltage sense reading, if started
    pub voltage: Option<u16>,
}

impl FrameSnapshot {
    /// Field values in wire order, with unset fields as [`UNSET_SENTINEL`]
    pub fn sentinel_values(&self) -> [i32; 4] {
        let value = |field: Option<u16>| field.map(i32::from).unwrap_or(UNSET_SENTINEL);
        [
            value(self.flex1),
            value(self.flex2),
            value(self.current),
            value(self.voltage),
        ]
    }

    /// Convert to a [`Frame`] if every field has been written
    ///
    /// This does not check that the high bytes arrived; callers that need a
    /// finished frame should gate on `FrameAssembler::filled` first.
    pub fn complete(&self) -> Option<Frame> {
        Some(Frame {
            flex1: self.flex1?,
            flex2: self.flex2?,
            current: self.current?,
            voltage: self.voltage?,
        })
    }
}

impl From<Frame> for FrameSnapshot {
    fn from(frame: Frame) -> Self {
        Self {
            flex1: Some(frame.flex1),
            flex2: Some(frame.flex2),
            current: Some(frame.current),
            voltage: Some(frame.voltage),
        }
    }
}
