//! Single-slot Frame Handoff
//!
//! Moves completed frames from the reception task to a consumer that may
//! live on another runtime or a plain thread. The slot holds one frame; a
//! put that cannot land within its timeout drops the frame instead of
//! stalling reception.

use nucleo_protocol::Frame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::error::{SendTimeoutError, TryRecvError};
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Default bound on how long a put may wait for the slot
pub const DEFAULT_PUT_TIMEOUT: Duration = Duration::from_millis(100);

/// Returned to consumers once the session has closed the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Handoff channel closed")]
pub struct ChannelClosed;

/// Result of offering a frame to the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The frame is in the slot
    Delivered,
    /// The slot stayed full for the whole timeout; the frame was discarded
    Dropped,
    /// The channel is closed or the consumer is gone
    Closed,
}

/// Delivery counters shared by every sender of a channel
#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time view of the channel counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandoffStats {
    /// Frames placed in the slot
    pub delivered: u64,
    /// Frames discarded after a put timed out
    pub dropped: u64,
}

/// Create a single-slot handoff channel
pub fn handoff_channel(put_timeout: Duration) -> (HandoffSender, HandoffReceiver) {
    let (tx, rx) = mpsc::channel(1);
    let (closed_tx, closed_rx) = watch::channel(false);

    let sender = HandoffSender {
        tx: Arc::new(Mutex::new(Some(tx))),
        closed: Arc::new(closed_tx),
        put_timeout,
        counters: Arc::new(Counters::default()),
    };
    let receiver = HandoffReceiver {
        rx,
        closed: closed_rx,
    };
    (sender, receiver)
}

/// Producer side of the handoff channel
///
/// Clones share one underlying sender, which [`close`](Self::close) takes
/// away so receivers blocked on a plain thread wake up as well.
#[derive(Debug, Clone)]
pub struct HandoffSender {
    tx: Arc<Mutex<Option<mpsc::Sender<Frame>>>>,
    closed: Arc<watch::Sender<bool>>,
    put_timeout: Duration,
    counters: Arc<Counters>,
}

impl HandoffSender {
    fn slot(&self) -> MutexGuard<'_, Option<mpsc::Sender<Frame>>> {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offer a frame, waiting at most the configured timeout
    pub async fn put(&self, frame: Frame) -> PutOutcome {
        if self.is_closed() {
            return PutOutcome::Closed;
        }
        let Some(tx) = self.slot().clone() else {
            return PutOutcome::Closed;
        };
        let mut closed = self.closed.subscribe();

        tokio::select! {
            biased;
            // A put in progress must not keep the channel open past close
            _ = closed.wait_for(|closed| *closed) => PutOutcome::Closed,
            sent = tx.send_timeout(frame, self.put_timeout) => match sent {
                Ok(()) => {
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                    PutOutcome::Delivered
                }
                Err(SendTimeoutError::Timeout(_)) => {
                    let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(
                        "Consumer did not drain within {:?}, dropped frame ({} total)",
                        self.put_timeout, dropped
                    );
                    PutOutcome::Dropped
                }
                Err(SendTimeoutError::Closed(_)) => PutOutcome::Closed,
            },
        }
    }

    /// Close the channel for every sender and receiver
    ///
    /// Consumers see [`ChannelClosed`] from then on, even if a frame is still
    /// sitting in the slot or another clone of this sender is still alive.
    pub fn close(self) {
        self.closed.send_replace(true);
        self.slot().take();
    }

    /// Whether the channel has been closed
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow() || self.slot().as_ref().map_or(true, |tx| tx.is_closed())
    }

    /// Current delivery counters
    pub fn stats(&self) -> HandoffStats {
        HandoffStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Consumer side of the handoff channel
#[derive(Debug)]
pub struct HandoffReceiver {
    rx: mpsc::Receiver<Frame>,
    closed: watch::Receiver<bool>,
}

impl HandoffReceiver {
    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Wait for the next frame
    pub async fn recv(&mut self) -> Result<Frame, ChannelClosed> {
        if self.is_closed() {
            return Err(ChannelClosed);
        }

        tokio::select! {
            biased;
            // Also resolves when every sender is gone
            _ = self.closed.wait_for(|closed| *closed) => Err(ChannelClosed),
            frame = self.rx.recv() => frame.ok_or(ChannelClosed),
        }
    }

    /// Wait up to `timeout` for the next frame
    ///
    /// `Ok(None)` means nothing arrived in time and the channel is still open.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Frame>, ChannelClosed> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Take a frame if one is waiting
    pub fn try_recv(&mut self) -> Result<Option<Frame>, ChannelClosed> {
        if self.is_closed() {
            return Err(ChannelClosed);
        }

        match self.rx.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ChannelClosed),
        }
    }

    /// Wait for the next frame from a thread outside any async runtime
    ///
    /// # Panics
    /// Panics if called from within an async execution context.
    pub fn blocking_recv(&mut self) -> Result<Frame, ChannelClosed> {
        if self.is_closed() {
            return Err(ChannelClosed);
        }

        match self.rx.blocking_recv() {
            Some(frame) if !self.is_closed() => Ok(frame),
            _ => Err(ChannelClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    const TIMEOUT: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn test_put_then_recv() {
        let (tx, mut rx) = handoff_channel(TIMEOUT);
        assert_eq!(tx.put(Frame::new(1, 2, 3, 4)).await, PutOutcome::Delivered);
        assert_eq!(rx.recv().await, Ok(Frame::new(1, 2, 3, 4)));
        assert_eq!(tx.stats().delivered, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_slot_drops_after_timeout() {
        let (tx, mut rx) = handoff_channel(TIMEOUT);
        assert_eq!(tx.put(Frame::new(1, 0, 0, 0)).await, PutOutcome::Delivered);

        let start = Instant::now();
        assert_eq!(tx.put(Frame::new(2, 0, 0, 0)).await, PutOutcome::Dropped);
        assert!(start.elapsed() >= TIMEOUT);
        assert!(start.elapsed() < TIMEOUT * 2);

        // The dropped frame is not retained behind the first one
        assert_eq!(rx.recv().await, Ok(Frame::new(1, 0, 0, 0)));
        assert_eq!(rx.try_recv(), Ok(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_many_drops_do_not_deadlock() {
        let (tx, mut rx) = handoff_channel(TIMEOUT);
        tx.put(Frame::default()).await;

        for i in 0..200u16 {
            assert_eq!(tx.put(Frame::new(i, 0, 0, 0)).await, PutOutcome::Dropped);
        }
        assert_eq!(tx.stats(), HandoffStats { delivered: 1, dropped: 200 });

        assert_eq!(rx.recv().await, Ok(Frame::default()));
        assert_eq!(tx.put(Frame::new(7, 7, 7, 7)).await, PutOutcome::Delivered);
        assert_eq!(rx.recv().await, Ok(Frame::new(7, 7, 7, 7)));
    }

    #[tokio::test]
    async fn test_close_unblocks_waiting_consumer() {
        let (tx, mut rx) = handoff_channel(TIMEOUT);
        let keep = tx.clone();
        let consumer = tokio::spawn(async move { rx.recv().await });

        tokio::task::yield_now().await;
        tx.close();

        assert_eq!(consumer.await.unwrap(), Err(ChannelClosed));
        assert_eq!(keep.put(Frame::default()).await, PutOutcome::Closed);
    }

    #[tokio::test]
    async fn test_pending_frame_not_drained_after_close() {
        let (tx, mut rx) = handoff_channel(TIMEOUT);
        tx.put(Frame::new(9, 9, 9, 9)).await;
        tx.close();
        assert_eq!(rx.recv().await, Err(ChannelClosed));
        assert_eq!(rx.try_recv(), Err(ChannelClosed));
    }

    #[tokio::test]
    async fn test_dropping_every_sender_closes() {
        let (tx, mut rx) = handoff_channel(TIMEOUT);
        drop(tx);
        assert_eq!(rx.recv().await, Err(ChannelClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_timeout_on_empty_channel() {
        let (_tx, mut rx) = handoff_channel(TIMEOUT);
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)).await, Ok(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consumer_gone_reports_closed() {
        let (tx, rx) = handoff_channel(TIMEOUT);
        drop(rx);
        assert_eq!(tx.put(Frame::default()).await, PutOutcome::Closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_wakes_blocked_thread_with_live_clone() {
        let (tx, mut rx) = handoff_channel(TIMEOUT);
        let other = tx.clone();
        let consumer = tokio::task::spawn_blocking(move || rx.blocking_recv());

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.close();

        let result = tokio::time::timeout(Duration::from_secs(2), consumer)
            .await
            .expect("blocked consumer was not woken by close")
            .unwrap();
        assert_eq!(result, Err(ChannelClosed));
        assert!(other.is_closed());
        assert_eq!(other.put(Frame::default()).await, PutOutcome::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_interrupts_waiting_put() {
        let (tx, _rx) = handoff_channel(Duration::from_secs(60));
        tx.put(Frame::default()).await;

        let waiting = tx.clone();
        let put = tokio::spawn(async move { waiting.put(Frame::new(1, 1, 1, 1)).await });
        tokio::task::yield_now().await;
        tx.close();

        assert_eq!(put.await.unwrap(), PutOutcome::Closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_consumer_on_plain_thread() {
        let (tx, mut rx) = handoff_channel(TIMEOUT);
        let consumer = tokio::task::spawn_blocking(move || {
            let first = rx.blocking_recv();
            let second = rx.blocking_recv();
            (first, second)
        });

        // Wait out the drop timeout if the consumer thread is slow to start
        let mut outcome = tx.put(Frame::new(3, 2, 1, 0)).await;
        while outcome == PutOutcome::Dropped {
            outcome = tx.put(Frame::new(3, 2, 1, 0)).await;
        }
        assert_eq!(outcome, PutOutcome::Delivered);
        tx.close();

        let (first, second) = consumer.await.unwrap();
        assert_eq!(first, Ok(Frame::new(3, 2, 1, 0)));
        assert_eq!(second, Err(ChannelClosed));
    }
}
