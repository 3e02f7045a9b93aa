/// Boxed source error from the underlying socket library.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur in the transport layer.
///
/// Every variant is scoped to a single connection or to the listener; the
/// server isolates them at the connection boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening socket failed.
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),

    /// Accepting a TCP stream failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The protocol upgrade (e.g. the WebSocket handshake) failed.
    #[error("handshake failed: {0}")]
    Handshake(#[source] BoxError),

    /// Writing a frame to the peer failed.
    #[error("send failed: {0}")]
    Send(#[source] BoxError),

    /// Reading a frame from the peer failed.
    #[error("receive failed: {0}")]
    Receive(#[source] BoxError),

    /// The connection is already closed.
    #[error("connection {0} closed")]
    Closed(crate::ConnectionId),
}
