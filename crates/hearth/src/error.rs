//! Unified error types for Hearth.

use hearth_protocol::{ConnectionId, ErrorKind, ProtocolError};
use hearth_room::RoomError;
use hearth_session::{AuthError, SessionError};
use hearth_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum HearthError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The tick loop has exited; the server no longer accepts commands.
    #[error("server stopped")]
    Stopped,
}

/// Outcome of a handler that did not apply.
///
/// Each variant maps to one recovery policy:
///
/// | Variant        | Policy                                              |
/// |----------------|-----------------------------------------------------|
/// | `Protocol`     | drop the connection                                 |
/// | `Auth`         | tell the client, keep the connection unless repeated |
/// | `Session`      | drop the message, log, keep the connection          |
/// | `Disconnected` | nothing to do: the connection is already gone       |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("{0} is disconnected")]
    Disconnected(ConnectionId),
}

impl HandlerError {
    /// The `Error` kind reported to the client, for session errors.
    pub fn client_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Session(SessionError::NoActiveSession(_)) => Some(ErrorKind::NoActiveSession),
            Self::Session(SessionError::UnknownRoom(_)) => Some(ErrorKind::UnknownRoom),
            Self::Session(SessionError::MessageTooLarge { .. }) => {
                Some(ErrorKind::MessageTooLarge)
            }
            _ => None,
        }
    }
}
