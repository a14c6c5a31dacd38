//! Byte-at-a-time Frame Assembly
//!
//! The serial driver hands over bytes in whatever chunk sizes it likes, so
//! the assembler only ever looks at one byte at a time and tracks how far
//! into the current frame it is.

use crate::frame::{Frame, FrameSnapshot, FRAME_LEN};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

/// Incremental decoder for one 8-byte telemetry frame
#[derive(Debug, Clone, Default)]
pub struct FrameAssembler {
    /// Bytes accepted since the last clear, in [0, 8]
    progress: usize,
    /// flex1, flex2, current, voltage
    fields: [Option<u16>; 4],
}

impl FrameAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard any partially assembled frame
    pub fn clear(&mut self) {
        self.progress = 0;
        self.fields = [None; 4];
    }

    /// Consume one byte
    ///
    /// Bytes arriving after the frame is complete are dropped until the next
    /// [`clear`](Self::clear).
    pub fn append(&mut self, byte: u8) {
        if self.progress >= FRAME_LEN {
            return;
        }

        // Even index is the low byte, odd index the high byte
        let shift = 8 * (self.progress % 2);
        let field = &mut self.fields[self.progress / 2];
        *field = Some(field.unwrap_or(0) | (u16::from(byte) << shift));

        self.progress += 1;
    }

    /// Consume a chunk of bytes in order
    pub fn extend(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.append(byte);
        }
    }

    /// Whether all eight bytes have arrived since the last clear
    pub fn filled(&self) -> bool {
        self.progress > FRAME_LEN - 1
    }

    /// Number of bytes accepted since the last clear
    pub fn progress(&self) -> usize {
        self.progress
    }

    /// Copy out the current field values
    pub fn snapshot(&self) -> FrameSnapshot {
        let [flex1, flex2, current, voltage] = self.fields;
        FrameSnapshot {
            flex1,
            flex2,
            current,
            voltage,
        }
    }

    /// The finished frame, if all eight bytes have arrived
    pub fn frame(&self) -> Option<Frame> {
        if self.filled() {
            self.snapshot().complete()
        } else {
            None
        }
    }
}

/// Assembler shared between the poll and reception activities
///
/// Every operation takes the lock once, so a clear from the poll side can
/// never interleave with a fill check and snapshot on the reception side.
#[derive(Debug, Clone, Default)]
pub struct SharedAssembler {
    inner: Arc<Mutex<FrameAssembler>>,
}

impl SharedAssembler {
    /// Create a shared assembler with no bytes consumed
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FrameAssembler> {
        // The assembler has no invariants a panicking holder could break
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Discard any partially assembled frame
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Feed bytes delivered by the transport
    ///
    /// Returns the finished frame whenever the assembler is filled after
    /// this delivery, including deliveries of excess bytes, so a frame whose
    /// earlier offer was dropped gets offered again. Empty deliveries return
    /// `None`.
    pub fn on_bytes_received(&self, bytes: &[u8]) -> Option<Frame> {
        if bytes.is_empty() {
            return None;
        }

        let mut assembler = self.lock();
        assembler.extend(bytes);

        let frame = assembler.frame()?;
        info!("Frame filled: {:?}", frame);
        Some(frame)
    }

    /// Copy out the current field values
    pub fn snapshot(&self) -> FrameSnapshot {
        self.lock().snapshot()
    }

    /// Whether all eight bytes have arrived since the last clear
    pub fn filled(&self) -> bool {
        self.lock().filled()
    }
}
