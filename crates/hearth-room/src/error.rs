//! Error types for the room layer.

use hearth_protocol::{ConnectionId, RoomId};

/// Errors that can occur during membership changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// No room with this id exists.
    #[error("unknown room {0}")]
    UnknownRoom(RoomId),

    /// The connection is already a member of this room.
    #[error("{0} already in room {1}")]
    AlreadyMember(ConnectionId, RoomId),

    /// The connection is not a member of this room.
    #[error("{0} not in room {1}")]
    NotMember(ConnectionId, RoomId),
}
