//! Transport abstraction layer for Hearth.
//!
//! Provides the [`Transport`] and [`Connection`] traits that the server's
//! event-loop adapter drives. The session core never touches a transport
//! directly: it only sees [`ConnectionId`]s and queued frames.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::{BoxError, TransportError};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;

/// Server-assigned identifier for a connection.
///
/// Allocated by the transport at accept time and never taken from
/// anything a client sends. It fits in a `u32` because it also travels
/// on the wire as a chat target and as the subject of broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u32);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u32`.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying `u32` value.
    pub fn into_inner(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, TransportError>;

    /// The address the transport is listening on.
    fn local_addr(&self) -> std::io::Result<std::net::SocketAddr>;
}

/// A single connection that can send and receive whole frames.
///
/// Methods take `&self` so one task can read while another writes; the
/// server shares a connection between its reader and writer tasks through
/// an `Arc`.
pub trait Connection: Send + Sync + 'static {
    /// Sends one frame to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), TransportError>;

    /// Returns the identifier assigned at accept time.
    fn id(&self) -> ConnectionId;
}
