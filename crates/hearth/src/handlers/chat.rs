//! Chat relay. No history is kept.

use hearth_protocol::{ConnectionId, ServerMessage};
use hearth_session::SessionError;

use crate::{HandlerError, World};

/// Delivers `text` from `conn`.
///
/// With no target, every member of the sender's room receives it (the
/// sender included). With a target, only that connection does; a target
/// without a player session is logged and the message dropped.
///
/// Returns the number of connections the message was queued for.
///
/// # Errors
/// - `NoActiveSession` if `conn` has no player
/// - `MessageTooLarge` if the delivery would not fit in one frame; nobody
///   receives it
pub fn relay(
    world: &mut World,
    conn: ConnectionId,
    target: Option<ConnectionId>,
    text: String,
) -> Result<usize, HandlerError> {
    let session = world
        .session(conn)
        .ok_or(SessionError::NoActiveSession(conn))?;
    let name = session.display_name.clone();
    let room = session.room.clone();

    let msg = ServerMessage::ChatDelivery {
        from: conn,
        name,
        text: text.clone(),
        private: target.is_some(),
    };
    world.check_fits(&msg)?;

    let delivered = match target {
        None => world.broadcast(&room, msg, None),
        Some(to) => {
            if world.session(to).is_none() {
                tracing::warn!(%conn, target = %to, "chat target has no player, dropping");
                return Ok(0);
            }
            usize::from(world.send(to, msg))
        }
    };

    world.presenter().chat_rendered(conn, target, &text);
    tracing::debug!(%conn, ?target, delivered, "chat relayed");
    Ok(delivered)
}
