//! Session Termination Signal

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Shared stop flag observed by the poll driver once per cycle
#[derive(Debug, Clone, Default)]
pub struct TerminationSignal {
    flag: Arc<AtomicBool>,
}

impl TerminationSignal {
    /// Create an unset signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the session to stop
    ///
    /// Setting an already-set signal has no further effect.
    pub fn set(&self) {
        if !self.flag.swap(true, Ordering::AcqRel) {
            info!("Session termination requested");
        }
    }

    /// Check whether a stop has been requested
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
