//! Transport abstraction layer for Exowire.
//!
//! The [`Transport`] trait hands out connections, the [`Connection`] trait
//! moves messages over one of them. Message boundaries are preserved: one
//! `recv()` yields exactly one frame's bytes.
//!
//! # Implementations
//!
//! - [`WebSocketTransport`] / [`WebSocketConnection`]: binary WebSocket
//!   messages, both server (`bind` + `accept`) and client (`connect`) side
//! - [`MemoryConnection`]: an in-process pair over Tokio channels
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::MemoryConnection;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared by every transport so ids never collide within a process.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique id of one connection, used as the `conn_id` log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }

    pub(crate) fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The listening side: produces one [`Connection`] per peer.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next peer.
    ///
    /// Fails with `Shutdown` once [`shutdown`](Self::shutdown) has run.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Stops accepting. Connections already handed out are unaffected.
    async fn shutdown(&self) -> Result<(), Self::Error>;

    /// The address the transport is listening on.
    ///
    /// Useful after binding to port 0.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// A single connection that can send and receive whole messages.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one message to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Waits for the next whole message.
    ///
    /// `Ok(None)` means the peer closed cleanly; no further messages will
    /// arrive.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes our side. The peer's `recv` then yields `Ok(None)`.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_formats_as_log_field() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
        assert_eq!(format!("{}", ConnectionId::new(0)), "conn-0");
    }

    #[test]
    fn test_connection_id_raw_value() {
        assert_eq!(ConnectionId::new(u64::MAX).into_inner(), u64::MAX);
    }

    #[test]
    fn test_connection_id_next_is_unique() {
        let ids: std::collections::HashSet<ConnectionId> =
            (0..100).map(|_| ConnectionId::next()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_connection_id_next_is_increasing() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert!(b.into_inner() > a.into_inner());
    }
}
