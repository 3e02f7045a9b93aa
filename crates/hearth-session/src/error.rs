//! Error types for the session layer.

use hearth_protocol::{ConnectionId, RejectReason, RoomId};

use crate::ConnectionState;

/// Why a login or spawn request was rejected.
///
/// Reported to the client; the connection stays open unless the same
/// connection keeps failing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Unknown username or wrong password.
    #[error("bad credentials")]
    BadCredentials,

    /// The connection already has a player session.
    #[error("already logged in")]
    AlreadyLoggedIn,

    /// The credential store failed or did not answer in time. The client
    /// may retry.
    #[error("authentication unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    /// The reason code sent back in `LoginRejected`.
    pub fn reason(&self) -> RejectReason {
        match self {
            Self::BadCredentials => RejectReason::BadCredentials,
            Self::AlreadyLoggedIn => RejectReason::AlreadyLoggedIn,
            Self::Unavailable(_) => RejectReason::Unavailable,
        }
    }
}

/// A request that needs session state which is not there.
///
/// The offending message is dropped and logged; the connection stays open.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The connection has no authenticated player.
    #[error("no active session for {0}")]
    NoActiveSession(ConnectionId),

    /// The requested room does not exist.
    #[error("unknown room {0}")]
    UnknownRoom(RoomId),

    /// A session can only be attached to a connection in `Connecting`.
    #[error("{id} is {state:?}, expected Connecting")]
    NotConnecting {
        id: ConnectionId,
        state: ConnectionState,
    },

    /// The resulting server message would exceed the frame limit.
    #[error("message of {len} bytes exceeds frame limit of {max}")]
    MessageTooLarge { len: usize, max: usize },

    /// The transport handed out an id that is already registered.
    #[error("{0} is already registered")]
    DuplicateConnection(ConnectionId),
}
