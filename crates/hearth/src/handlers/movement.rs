//! Authoritative movement.
//!
//! Clients send a key, never a position. The new position is the old one
//! plus one configured step along the key's axis, and the result goes to
//! everyone in the mover's room, the mover included.

use hearth_protocol::{ConnectionId, Direction, Position, ServerMessage};
use hearth_session::SessionError;

use crate::{HandlerError, World};

pub fn apply_input(
    world: &mut World,
    conn: ConnectionId,
    key: Direction,
) -> Result<Position, HandlerError> {
    let step = world.config().move_step;
    let session = world
        .session_mut(conn)
        .ok_or(SessionError::NoActiveSession(conn))?;

    let position = session.position.stepped(key, step);
    session.position = position;
    let room = session.room.clone();

    world.broadcast(&room, ServerMessage::PositionUpdate { id: conn, position }, None);
    world.presenter().player_moved(conn, position);
    tracing::debug!(%conn, ?key, %position, "moved");
    Ok(position)
}
