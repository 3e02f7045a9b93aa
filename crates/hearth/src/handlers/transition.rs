//! Room transitions.

use hearth_protocol::{ConnectionId, RoomId, RosterEntry, ServerMessage};
use hearth_session::SessionError;

use crate::{HandlerError, World};

/// Moves `conn` into `room` and returns who else is there.
///
/// The old room's remaining members get `PlayerLeft`, the new room's
/// members get `PlayerJoined` and the mover gets `RoomRoster`. Switching
/// to the room the player is already in only resends the roster.
///
/// # Errors
/// - `NoActiveSession` if `conn` has no player
/// - `UnknownRoom` if `room` does not exist; the session keeps its room
pub fn switch_room(
    world: &mut World,
    conn: ConnectionId,
    room: RoomId,
) -> Result<Vec<RosterEntry>, HandlerError> {
    let session = world
        .session(conn)
        .ok_or(SessionError::NoActiveSession(conn))?;

    if session.room != room {
        let entry = session.roster_entry();
        let from = world.relocate(conn, &room)?;

        world.broadcast(&from, ServerMessage::PlayerLeft { id: conn }, None);
        world.broadcast(&room, ServerMessage::PlayerJoined { entry }, Some(conn));
        world.presenter().room_loaded(conn, &room);
        tracing::info!(%conn, %from, to = %room, "changed room");
    }

    Ok(world.send_roster(conn, &room))
}

#[cfg(test)]
mod tests {
    use hearth_session::Outbound;
    use tokio::sync::mpsc::{self, Receiver};

    use super::*;
    use crate::ServerConfig;

    fn cid(id: u32) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn room(name: &str) -> RoomId {
        RoomId::new(name)
    }

    fn join(world: &mut World, id: u32) -> Receiver<Outbound> {
        let (tx, mut rx) = mpsc::channel(64);
        world.connect(cid(id), tx).unwrap();
        world.spawn(cid(id), format!("p{id}")).unwrap();
        while rx.try_recv().is_ok() {}
        rx
    }

    fn drain(rx: &mut Receiver<Outbound>) -> Vec<ServerMessage> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .filter_map(|o| match o {
                Outbound::Message(m) => Some(m),
                Outbound::Close => None,
            })
            .collect()
    }

    fn world() -> World {
        World::new(ServerConfig::default()).unwrap()
    }

    #[test]
    fn test_switch_room_moves_session_and_membership() {
        let mut w = world();
        let _a = join(&mut w, 1);

        switch_room(&mut w, cid(1), room("forest")).unwrap();

        assert_eq!(w.session(cid(1)).unwrap().room, room("forest"));
        assert_eq!(w.rooms().members(&room("forest")), vec![cid(1)]);
        assert!(w.rooms().members(&room("town_square")).is_empty());
    }

    #[test]
    fn test_switch_room_returns_roster_of_new_room() {
        let mut w = world();
        let _a = join(&mut w, 1);
        let _b = join(&mut w, 2);
        switch_room(&mut w, cid(2), room("forest")).unwrap();

        let roster = switch_room(&mut w, cid(1), room("forest")).unwrap();

        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].id, cid(2));
        assert_eq!(roster[0].name, "p2");
    }

    #[test]
    fn test_switch_room_notifies_old_and_new_rooms() {
        let mut w = world();
        let mut mover = join(&mut w, 1);
        let mut stayer = join(&mut w, 2);
        let mut host = join(&mut w, 3);
        switch_room(&mut w, cid(3), room("harbor")).unwrap();
        drain(&mut mover);
        drain(&mut stayer);
        drain(&mut host);

        switch_room(&mut w, cid(1), room("harbor")).unwrap();

        assert_eq!(drain(&mut stayer), vec![ServerMessage::PlayerLeft { id: cid(1) }]);
        let to_host = drain(&mut host);
        assert!(matches!(
            to_host.as_slice(),
            [ServerMessage::PlayerJoined { entry }] if entry.id == cid(1)
        ));
        let to_mover = drain(&mut mover);
        assert!(matches!(
            to_mover.as_slice(),
            [ServerMessage::RoomRoster { room: r, members }]
                if *r == room("harbor") && members.len() == 1
        ));
    }

    #[test]
    fn test_switch_room_unknown_room_leaves_session_unchanged() {
        let mut w = world();
        let _a = join(&mut w, 1);

        let result = switch_room(&mut w, cid(1), room("moon"));

        assert_eq!(
            result,
            Err(HandlerError::Session(SessionError::UnknownRoom(room("moon"))))
        );
        assert_eq!(w.session(cid(1)).unwrap().room, room("town_square"));
        assert_eq!(w.rooms().members(&room("town_square")), vec![cid(1)]);
    }

    #[test]
    fn test_switch_room_to_current_room_only_resends_roster() {
        let mut w = world();
        let mut a = join(&mut w, 1);
        let mut b = join(&mut w, 2);

        let roster = switch_room(&mut w, cid(1), room("town_square")).unwrap();

        assert_eq!(roster.len(), 1);
        assert!(drain(&mut b).is_empty());
        assert_eq!(drain(&mut a).len(), 1);
    }

    #[test]
    fn test_switch_room_without_session_is_rejected() {
        let mut w = world();
        let result = switch_room(&mut w, cid(1), room("forest"));
        assert_eq!(
            result,
            Err(HandlerError::Session(SessionError::NoActiveSession(cid(1))))
        );
    }
}
