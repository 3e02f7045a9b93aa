//! The seam to the host's presentation layer.
//!
//! Hearth decides *what* happened; the host decides how to show it
//! (instantiate an avatar, load a scene, print a chat line). Every method
//! has an empty default, so a headless server can pass [`NullPresenter`]
//! and a host only overrides the events it cares about.
//!
//! Calls come from the tick loop, synchronously, after the state change
//! they describe has been applied. Implementations must not block.

use hearth_protocol::{ConnectionId, Position, RoomId};

/// Receives world events after they are applied.
pub trait Presenter: Send + 'static {
    /// A player session was created and placed in `room` at `position`.
    fn player_spawned(&mut self, conn: ConnectionId, name: &str, room: &RoomId, position: Position) {
        let _ = (conn, name, room, position);
    }

    fn player_moved(&mut self, conn: ConnectionId, position: Position) {
        let _ = (conn, position);
    }

    /// The player's session ended (logout, disconnect or kick).
    fn player_left(&mut self, conn: ConnectionId, room: &RoomId) {
        let _ = (conn, room);
    }

    /// `conn` switched into `room`; the host should load it for them.
    fn room_loaded(&mut self, conn: ConnectionId, room: &RoomId) {
        let _ = (conn, room);
    }

    /// A chat line was delivered. `target` is `None` for room broadcasts.
    fn chat_rendered(&mut self, from: ConnectionId, target: Option<ConnectionId>, text: &str) {
        let _ = (from, target, text);
    }
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresenter;

impl Presenter for NullPresenter {}
