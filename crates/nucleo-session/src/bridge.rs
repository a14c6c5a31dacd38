//! Reception and Delivery Bridge
//!
//! Reads raw bytes from the transport, feeds them to the shared assembler
//! and hands each completed frame to the consumer channel.

use crate::error::SessionError;
use crate::handoff::{HandoffSender, PutOutcome};
use crate::SharedConnection;
use nucleo_protocol::{ProtocolError, SharedAssembler};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, info, trace};

/// Default size of the transport read buffer
pub const DEFAULT_READ_BUFFER: usize = 64;

/// Why the bridge stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeExit {
    /// The transport reached end of stream
    TransportClosed,
    /// The handoff channel was closed or its consumer dropped
    ConsumerGone,
}

/// Reception loop feeding the handoff channel
pub struct DeliveryBridge<R, W> {
    reader: R,
    assembler: SharedAssembler,
    connection: SharedConnection<W>,
    sender: HandoffSender,
    read_buffer: usize,
}

impl<R, W> DeliveryBridge<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a bridge over the transport read half
    pub fn new(
        reader: R,
        assembler: SharedAssembler,
        connection: SharedConnection<W>,
        sender: HandoffSender,
    ) -> Self {
        Self {
            reader,
            assembler,
            connection,
            sender,
            read_buffer: DEFAULT_READ_BUFFER,
        }
    }

    /// Set the transport read buffer size
    pub fn with_read_buffer(mut self, size: usize) -> Self {
        self.read_buffer = size.max(1);
        self
    }

    /// Run until the transport or the consumer goes away
    ///
    /// Every delivery that leaves the assembler filled offers the frame
    /// again, so excess bytes give a previously dropped frame another
    /// chance. The bridge never clears the assembler; that belongs to the
    /// poll driver, so a frame stays intact until the next request cycle.
    pub async fn run(mut self) -> Result<BridgeExit, SessionError> {
        info!("Starting delivery bridge");
        let mut buf = vec![0u8; self.read_buffer];

        loop {
            let n = match self.reader.read(&mut buf).await {
                Ok(0) => {
                    self.connection.lock().await.connection_lost(None);
                    info!("Transport closed, delivery bridge stopping");
                    return Ok(BridgeExit::TransportClosed);
                }
                Ok(n) => n,
                Err(err) => {
                    let err = ProtocolError::from(err);
                    self.connection.lock().await.connection_lost(Some(&err));
                    return Err(err.into());
                }
            };
            trace!("Received {} bytes", n);

            let Some(frame) = self.assembler.on_bytes_received(&buf[..n]) else {
                continue;
            };

            match self.sender.put(frame).await {
                PutOutcome::Delivered => {}
                PutOutcome::Dropped => debug!("Frame dropped: {:?}", frame),
                PutOutcome::Closed => {
                    info!("Handoff channel closed, delivery bridge stopping");
                    return Ok(BridgeExit::ConsumerGone);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::{handoff_channel, HandoffStats, DEFAULT_PUT_TIMEOUT};
    use nucleo_protocol::{Connection, Frame};
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::Mutex;

    fn bridge_over(
        reader: tokio::io::DuplexStream,
        assembler: SharedAssembler,
        sender: HandoffSender,
    ) -> (
        DeliveryBridge<tokio::io::DuplexStream, tokio::io::DuplexStream>,
        SharedConnection<tokio::io::DuplexStream>,
    ) {
        let (writer, _peer) = tokio::io::duplex(8);
        let connection = Arc::new(Mutex::new(Connection::connected(writer)));
        let bridge = DeliveryBridge::new(reader, assembler, connection.clone(), sender);
        (bridge, connection)
    }

    #[tokio::test]
    async fn test_chunked_bytes_deliver_one_frame() {
        let (host, mut device) = tokio::io::duplex(64);
        let (tx, mut rx) = handoff_channel(DEFAULT_PUT_TIMEOUT);
        let (bridge, _connection) = bridge_over(host, SharedAssembler::new(), tx);
        let task = tokio::spawn(bridge.run());

        let bytes = [0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, 0x00];
        for chunk in [&bytes[..3], &bytes[3..5], &bytes[5..]] {
            device.write_all(chunk).await.unwrap();
            device.flush().await.unwrap();
            tokio::task::yield_now().await;
        }

        assert_eq!(rx.recv().await, Ok(Frame::new(1, 2, 3, 4)));

        drop(device);
        assert_eq!(task.await.unwrap().unwrap(), BridgeExit::TransportClosed);
    }

    #[tokio::test]
    async fn test_eof_marks_connection_lost() {
        let (host, device) = tokio::io::duplex(64);
        let (tx, _rx) = handoff_channel(DEFAULT_PUT_TIMEOUT);
        let (bridge, connection) = bridge_over(host, SharedAssembler::new(), tx);

        drop(device);
        assert_eq!(bridge.run().await.unwrap(), BridgeExit::TransportClosed);
        assert!(!connection.lock().await.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_consumer_drops_frames() {
        let (host, mut device) = tokio::io::duplex(64);
        let (tx, mut rx) = handoff_channel(DEFAULT_PUT_TIMEOUT);
        let stats = tx.clone();
        let assembler = SharedAssembler::new();
        let (bridge, _connection) = bridge_over(host, assembler.clone(), tx);
        let task = tokio::spawn(bridge.run());

        for value in 1..=3u16 {
            assembler.clear();
            device.write_all(&Frame::new(value, 0, 0, 0).to_bytes()).await.unwrap();
            // Let the bridge finish its put (or its timeout) before the next clear
            tokio::time::sleep(DEFAULT_PUT_TIMEOUT * 2).await;
        }

        assert_eq!(rx.recv().await, Ok(Frame::new(1, 0, 0, 0)));
        assert_eq!(rx.try_recv(), Ok(None));
        assert_eq!(stats.stats().dropped, 2);

        stats.close();
        drop(device);
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_excess_bytes_reoffer_filled_frame() {
        let (host, mut device) = tokio::io::duplex(64);
        let (tx, mut rx) = handoff_channel(DEFAULT_PUT_TIMEOUT);
        let stats = tx.clone();
        let (bridge, _connection) = bridge_over(host, SharedAssembler::new(), tx);
        let task = tokio::spawn(bridge.run());

        let frame = Frame::new(10, 20, 30, 40);
        device.write_all(&frame.to_bytes()).await.unwrap();
        tokio::time::sleep(DEFAULT_PUT_TIMEOUT / 10).await;

        // Slot is still full, so the re-offer from this delivery is dropped
        device.write_all(&[0x99]).await.unwrap();
        tokio::time::sleep(DEFAULT_PUT_TIMEOUT * 2).await;
        assert_eq!(stats.stats(), HandoffStats { delivered: 1, dropped: 1 });

        assert_eq!(rx.recv().await, Ok(frame));

        // Once drained, further excess bytes get the same frame through
        device.write_all(&[0x42]).await.unwrap();
        assert_eq!(rx.recv().await, Ok(frame));
        assert_eq!(stats.stats().delivered, 2);

        stats.close();
        drop(device);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_closed_channel_stops_bridge() {
        let (host, mut device) = tokio::io::duplex(64);
        let (tx, rx) = handoff_channel(DEFAULT_PUT_TIMEOUT);
        drop(rx);
        let (bridge, _connection) = bridge_over(host, SharedAssembler::new(), tx);

        device.write_all(&[0u8; 8]).await.unwrap();
        assert_eq!(bridge.run().await.unwrap(), BridgeExit::ConsumerGone);
    }
}
