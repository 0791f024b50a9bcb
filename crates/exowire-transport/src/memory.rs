//! In-process connections over Tokio channels.

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::{Connection, ConnectionId, TransportError};

/// One end of an in-memory connection pair.
///
/// Each `send` arrives as exactly one `recv` on the other end, so message
/// boundaries behave like WebSocket messages. Closing (or dropping) one
/// end makes the other's `recv` return `Ok(None)`.
#[derive(Debug)]
pub struct MemoryConnection {
    id: ConnectionId,
    tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl MemoryConnection {
    /// Creates two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (Self::new(a_tx, a_rx), Self::new(b_tx, b_rx))
    }

    fn new(tx: mpsc::UnboundedSender<Vec<u8>>, rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            id: ConnectionId::next(),
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    fn sender(&self) -> Option<mpsc::UnboundedSender<Vec<u8>>> {
        self.tx.lock().ok().and_then(|tx| tx.clone())
    }
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let tx = self
            .sender()
            .ok_or_else(|| TransportError::ConnectionClosed("closed locally".into()))?;
        tx.send(data.to_vec())
            .map_err(|_| TransportError::ConnectionClosed("peer dropped".into()))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.rx.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        if let Ok(mut tx) = self.tx.lock() {
            *tx = None;
        }
        tracing::debug!(id = %self.id, "closed memory connection");
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
