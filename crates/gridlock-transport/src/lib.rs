//! Transport layer for the Gridlock game server.
//!
//! Provides the [`Listener`] and [`Connection`] traits over which the server
//! accepts clients and exchanges framed bytes. Every client speaks over a
//! single persistent, reliable, ordered stream — the event-ordering
//! guarantees of the orchestrator depend on that property, so there is no
//! unreliable-delivery hook here.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

#[cfg(feature = "websocket")]
mod ws;

#[cfg(feature = "websocket")]
pub use ws::{WsConnection, WsListener};

use std::fmt;

/// Opaque identifier for a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

impl ConnId {
    /// Creates a `ConnId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed by the peer.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending a frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),
}

/// Accepts new incoming client connections.
pub trait Listener: Send + Sync + 'static {
    /// The connection type produced by this listener.
    type Connection: Connection;
    /// The error type for listener operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// A single client connection carrying framed bytes, in order.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame to the client.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame from the client.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conn_id_new_and_into_inner() {
        let id = ConnId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_conn_id_display() {
        assert_eq!(ConnId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_conn_id_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnId::new(1), "alice");
        map.insert(ConnId::new(2), "bob");
        assert_eq!(map[&ConnId::new(1)], "alice");
    }
}
