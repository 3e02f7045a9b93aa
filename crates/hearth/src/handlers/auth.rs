//! Login, guest spawn and logout.
//!
//! Credential lookups are async and may be slow, so they do not run here.
//! The connection's reader task verifies the credentials (bounded by the
//! configured timeout) and enqueues the verdict; [`login`] applies it on
//! the tick. A connection that is already authenticated is rejected before
//! the verdict is even looked at.

use hearth_protocol::{ConnectionId, ServerMessage};
use hearth_session::{AuthError, ConnectionState, Identity, PlayerSession, SessionError};

use crate::{HandlerError, World};

/// Applies a credential verdict for `conn`.
///
/// On success the connection gets exactly one session in the spawn room.
/// On failure the client is sent `LoginRejected` and the connection stays
/// open.
pub fn login(
    world: &mut World,
    conn: ConnectionId,
    verdict: Result<Identity, AuthError>,
) -> Result<PlayerSession, HandlerError> {
    match world.state(conn) {
        ConnectionState::Disconnected => return Err(HandlerError::Disconnected(conn)),
        ConnectionState::Authenticated => {
            return Err(reject(world, conn, AuthError::AlreadyLoggedIn));
        }
        ConnectionState::Connecting => {}
    }

    match verdict {
        Ok(identity) => world.spawn(conn, identity.display_name),
        Err(err) => Err(reject(world, conn, err)),
    }
}

/// Spawns a guest player without credentials, if the server allows it.
pub fn add_player(world: &mut World, conn: ConnectionId) -> Result<PlayerSession, HandlerError> {
    match world.state(conn) {
        ConnectionState::Disconnected => Err(HandlerError::Disconnected(conn)),
        ConnectionState::Authenticated => Err(reject(world, conn, AuthError::AlreadyLoggedIn)),
        ConnectionState::Connecting if !world.config().allow_guests => {
            Err(reject(world, conn, AuthError::BadCredentials))
        }
        ConnectionState::Connecting => {
            let name = format!("guest-{}", conn.into_inner());
            world.spawn(conn, name)
        }
    }
}

/// Ends the player's session and closes the connection, through the same
/// path as a disconnect.
pub fn logout(world: &mut World, conn: ConnectionId) -> Result<(), HandlerError> {
    if world.session(conn).is_none() {
        return Err(SessionError::NoActiveSession(conn).into());
    }
    tracing::info!(%conn, "logout");
    world.deregister(conn);
    Ok(())
}

fn reject(world: &mut World, conn: ConnectionId, err: AuthError) -> HandlerError {
    tracing::info!(%conn, error = %err, "login rejected");
    world.send(conn, ServerMessage::LoginRejected { reason: err.reason() });
    err.into()
}

#[cfg(test)]
mod tests {
    use hearth_protocol::RejectReason;
    use hearth_session::Outbound;
    use tokio::sync::mpsc::{self, Receiver};

    use super::*;
    use crate::ServerConfig;

    fn cid(id: u32) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn world(allow_guests: bool) -> World {
        World::new(ServerConfig {
            allow_guests,
            spawn_seed: Some(3),
            ..ServerConfig::default()
        })
        .unwrap()
    }

    fn connect(world: &mut World, id: u32) -> Receiver<Outbound> {
        let (tx, rx) = mpsc::channel(64);
        world.connect(cid(id), tx).unwrap();
        rx
    }

    fn alice() -> Result<Identity, AuthError> {
        Ok(Identity { display_name: "alice".into() })
    }

    fn last_message(rx: &mut Receiver<Outbound>) -> Option<ServerMessage> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .filter_map(|o| match o {
                Outbound::Message(m) => Some(m),
                Outbound::Close => None,
            })
            .last()
    }

    #[test]
    fn test_login_valid_verdict_authenticates_with_one_session() {
        let mut w = world(false);
        let _rx = connect(&mut w, 1);

        let session = login(&mut w, cid(1), alice()).unwrap();

        assert_eq!(session.display_name, "alice");
        assert_eq!(w.state(cid(1)), ConnectionState::Authenticated);
        assert_eq!(w.registry().sessions().count(), 1);
    }

    #[test]
    fn test_login_twice_is_already_logged_in_without_duplicate() {
        let mut w = world(false);
        let mut rx = connect(&mut w, 1);
        login(&mut w, cid(1), alice()).unwrap();

        let result = login(&mut w, cid(1), alice());

        assert_eq!(result, Err(HandlerError::Auth(AuthError::AlreadyLoggedIn)));
        assert_eq!(w.registry().sessions().count(), 1);
        assert_eq!(w.rooms().member_count(), 1);
        assert_eq!(
            last_message(&mut rx),
            Some(ServerMessage::LoginRejected { reason: RejectReason::AlreadyLoggedIn })
        );
    }

    #[test]
    fn test_login_already_logged_in_wins_over_failed_verdict() {
        let mut w = world(false);
        let _rx = connect(&mut w, 1);
        login(&mut w, cid(1), alice()).unwrap();

        let result = login(&mut w, cid(1), Err(AuthError::BadCredentials));

        assert_eq!(result, Err(HandlerError::Auth(AuthError::AlreadyLoggedIn)));
    }

    #[test]
    fn test_login_bad_credentials_keeps_connection_open() {
        let mut w = world(false);
        let mut rx = connect(&mut w, 1);

        let result = login(&mut w, cid(1), Err(AuthError::BadCredentials));

        assert_eq!(result, Err(HandlerError::Auth(AuthError::BadCredentials)));
        assert_eq!(w.state(cid(1)), ConnectionState::Connecting);
        assert_eq!(
            last_message(&mut rx),
            Some(ServerMessage::LoginRejected { reason: RejectReason::BadCredentials })
        );
    }

    #[test]
    fn test_login_unavailable_is_reported_as_retryable() {
        let mut w = world(false);
        let mut rx = connect(&mut w, 1);

        let result = login(&mut w, cid(1), Err(AuthError::Unavailable("timeout".into())));

        assert!(matches!(result, Err(HandlerError::Auth(AuthError::Unavailable(_)))));
        assert_eq!(
            last_message(&mut rx),
            Some(ServerMessage::LoginRejected { reason: RejectReason::Unavailable })
        );
        assert!(login(&mut w, cid(1), alice()).is_ok());
    }

    #[test]
    fn test_login_on_unknown_connection_is_noop() {
        let mut w = world(false);
        let result = login(&mut w, cid(5), alice());
        assert_eq!(result, Err(HandlerError::Disconnected(cid(5))));
        assert_eq!(w.registry().sessions().count(), 0);
    }

    #[test]
    fn test_add_player_guest_allowed_spawns_guest() {
        let mut w = world(true);
        let _rx = connect(&mut w, 7);

        let session = add_player(&mut w, cid(7)).unwrap();

        assert_eq!(session.display_name, "guest-7");
        assert_eq!(w.state(cid(7)), ConnectionState::Authenticated);
    }

    #[test]
    fn test_add_player_guest_disallowed_is_bad_credentials() {
        let mut w = world(false);
        let _rx = connect(&mut w, 7);

        let result = add_player(&mut w, cid(7));

        assert_eq!(result, Err(HandlerError::Auth(AuthError::BadCredentials)));
        assert!(w.session(cid(7)).is_none());
    }

    #[test]
    fn test_add_player_after_login_is_already_logged_in() {
        let mut w = world(true);
        let _rx = connect(&mut w, 1);
        login(&mut w, cid(1), alice()).unwrap();

        let result = add_player(&mut w, cid(1));

        assert_eq!(result, Err(HandlerError::Auth(AuthError::AlreadyLoggedIn)));
        assert_eq!(w.session(cid(1)).unwrap().display_name, "alice");
    }

    #[test]
    fn test_logout_removes_session_and_connection() {
        let mut w = world(false);
        let _rx = connect(&mut w, 1);
        login(&mut w, cid(1), alice()).unwrap();

        logout(&mut w, cid(1)).unwrap();

        assert_eq!(w.state(cid(1)), ConnectionState::Disconnected);
        assert!(w.session(cid(1)).is_none());
        assert_eq!(w.rooms().member_count(), 0);
    }

    #[test]
    fn test_logout_without_session_is_no_active_session() {
        let mut w = world(false);
        let _rx = connect(&mut w, 1);

        let result = logout(&mut w, cid(1));

        assert_eq!(
            result,
            Err(HandlerError::Session(SessionError::NoActiveSession(cid(1))))
        );
        assert!(w.registry().is_live(cid(1)));
    }
}
