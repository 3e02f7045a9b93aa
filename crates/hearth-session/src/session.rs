//! The authenticated player bound to a connection.

use hearth_protocol::{ConnectionId, Position, RoomId, RosterEntry};

/// Player state for one authenticated connection.
///
/// Lives inside its [`ConnectionEntry`](crate::ConnectionEntry); there is
/// no way to hold a `PlayerSession` in the registry without its
/// connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSession {
    /// The owning connection. Unique across the registry.
    pub connection_id: ConnectionId,
    pub display_name: String,
    /// Authoritative position; only the movement handler writes it.
    pub position: Position,
    /// Must always name a room whose member set contains `connection_id`.
    pub room: RoomId,
}

impl PlayerSession {
    /// How this player appears in roster snapshots and join broadcasts.
    pub fn roster_entry(&self) -> RosterEntry {
        RosterEntry {
            id: self.connection_id,
            name: self.display_name.clone(),
            position: self.position,
        }
    }
}
