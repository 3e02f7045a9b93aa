//! The authoritative world: connection registry plus room membership.
//!
//! `World` is the only place that touches both stores. Every method that
//! changes one of them changes the other in the same call, so between any
//! two calls these hold:
//!
//! - every `PlayerSession` belongs to a live connection
//! - a session's `room` names a room whose member set contains it
//! - every room member has a session
//!
//! The tick loop owns the `World` by value. Nothing here locks.
//!
//! Outbound messages are size-checked here, on the tick, so nothing is
//! queued that the writer task could not encode. A client whose queue is
//! full is noted and removed by [`World::evict_lagging`].

use hearth_protocol::{
    ConnectionId, FrameCodec, Position, RoomId, RosterEntry, ServerMessage,
};
use hearth_room::RoomManager;
use hearth_session::{
    AuthError, ClientSender, ConnectionState, Delivery, PlayerSession,
    Registry, SessionError,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::{ConfigError, HandlerError, NullPresenter, Presenter, ServerConfig};

pub struct World {
    config: ServerConfig,
    registry: Registry,
    rooms: RoomManager,
    rng: StdRng,
    presenter: Box<dyn Presenter>,
    codec: FrameCodec,
    /// Connections whose outbound queue overflowed since the last eviction.
    lagging: Vec<ConnectionId>,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("registry", &self.registry)
            .field("rooms", &self.rooms)
            .field("lagging", &self.lagging)
            .finish_non_exhaustive()
    }
}

impl World {
    /// Builds an empty world with one room per configured id.
    pub fn new(config: ServerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = match config.spawn_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let rooms = RoomManager::new(config.rooms.iter().cloned());
        let codec = FrameCodec::new(config.max_frame_len);

        Ok(Self {
            config,
            registry: Registry::new(),
            rooms,
            rng,
            presenter: Box::new(NullPresenter),
            codec,
            lagging: Vec::new(),
        })
    }

    pub fn with_presenter(self, presenter: impl Presenter) -> Self {
        self.with_boxed_presenter(Box::new(presenter))
    }

    pub fn with_boxed_presenter(mut self, presenter: Box<dyn Presenter>) -> Self {
        self.presenter = presenter;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    pub fn session(&self, conn: ConnectionId) -> Option<&PlayerSession> {
        self.registry.session(conn)
    }

    pub fn state(&self, conn: ConnectionId) -> ConnectionState {
        self.registry.state(conn)
    }

    pub(crate) fn session_mut(&mut self, conn: ConnectionId) -> Option<&mut PlayerSession> {
        self.registry.session_mut(conn)
    }

    pub(crate) fn presenter(&mut self) -> &mut dyn Presenter {
        self.presenter.as_mut()
    }

    pub(crate) fn record_auth_failure(&mut self, conn: ConnectionId) -> u32 {
        self.registry.record_auth_failure(conn)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Registers an accepted connection in `Connecting`.
    pub fn connect(
        &mut self,
        conn: ConnectionId,
        sender: ClientSender,
    ) -> Result<(), SessionError> {
        self.registry.register(conn, sender)?;
        tracing::info!(%conn, "connection accepted");
        Ok(())
    }

    /// Creates the player session for `conn` and places it in the spawn room
    /// at a random point of the spawn box.
    ///
    /// The new player gets `LoginAccepted` and a roster of the room; the
    /// room's other members get `PlayerJoined`.
    pub fn spawn(
        &mut self,
        conn: ConnectionId,
        display_name: String,
    ) -> Result<PlayerSession, HandlerError> {
        match self.registry.state(conn) {
            ConnectionState::Connecting => {}
            ConnectionState::Authenticated => return Err(AuthError::AlreadyLoggedIn.into()),
            ConnectionState::Disconnected => return Err(HandlerError::Disconnected(conn)),
        }

        let room = self.config.spawn_room.clone();
        let position = self.config.spawn.sample(&mut self.rng);

        if let Err(err) = self.rooms.add_member(&room, conn) {
            tracing::error!(%conn, %room, error = %err, "spawn room rejected new player");
            return Err(SessionError::UnknownRoom(room).into());
        }
        let session = PlayerSession {
            connection_id: conn,
            display_name,
            position,
            room: room.clone(),
        };
        if let Err(err) = self.registry.attach_session(session.clone()) {
            let _ = self.rooms.remove_member(&room, conn);
            return Err(err.into());
        }

        self.send(
            conn,
            ServerMessage::LoginAccepted {
                id: conn,
                name: session.display_name.clone(),
                room: room.clone(),
                position,
            },
        );
        self.send_roster(conn, &room);
        self.broadcast(
            &room,
            ServerMessage::PlayerJoined { entry: session.roster_entry() },
            Some(conn),
        );
        self.presenter
            .player_spawned(conn, &session.display_name, &room, position);

        tracing::info!(
            %conn,
            name = %session.display_name,
            %room,
            %position,
            "player spawned"
        );
        Ok(session)
    }

    /// Removes `conn` everywhere in one step: registry entry, session and
    /// room membership. Remaining room members get `PlayerLeft` and the
    /// writer task is told to close.
    ///
    /// Unknown ids are a no-op; returns whether anything was removed.
    pub fn deregister(&mut self, conn: ConnectionId) -> bool {
        let Some(entry) = self.registry.remove(conn) else {
            tracing::trace!(%conn, "deregister of unknown connection ignored");
            return false;
        };

        if let Some(session) = entry.session() {
            if let Err(err) = self.rooms.remove_member(&session.room, conn) {
                tracing::error!(%conn, room = %session.room, error = %err, "session was not in its room");
            }
            self.broadcast(&session.room, ServerMessage::PlayerLeft { id: conn }, None);
            self.presenter.player_left(conn, &session.room);
            tracing::info!(%conn, name = %session.display_name, room = %session.room, "player left");
        }

        entry.close();
        tracing::info!(%conn, "connection deregistered");
        true
    }

    /// Sends `Kick` to `conn`, then deregisters it.
    pub fn kick(&mut self, conn: ConnectionId, reason: &str) -> bool {
        if !self.registry.is_live(conn) {
            return false;
        }
        tracing::warn!(%conn, %reason, "kicking connection");
        self.send(conn, ServerMessage::Kick { reason: reason.to_string() });
        self.deregister(conn)
    }

    /// Deregisters every connection whose outbound queue overflowed.
    ///
    /// Their departure is broadcast like any other, which can push further
    /// slow clients over; those are removed in the same call. Returns how
    /// many connections were dropped.
    pub fn evict_lagging(&mut self) -> usize {
        let mut evicted = 0;
        while !self.lagging.is_empty() {
            for conn in std::mem::take(&mut self.lagging) {
                if self.registry.is_live(conn) {
                    tracing::warn!(%conn, "outbound queue full, dropping slow connection");
                    self.deregister(conn);
                    evicted += 1;
                }
            }
        }
        evicted
    }

    /// Deregisters every connection.
    pub fn clear(&mut self) {
        let ids: Vec<ConnectionId> = self.registry.ids().collect();
        for conn in ids {
            self.deregister(conn);
        }
    }

    /// Moves `conn`'s session to `to`, updating membership and the session's
    /// room together. Returns the room it left.
    ///
    /// Nothing changes on error.
    pub(crate) fn relocate(
        &mut self,
        conn: ConnectionId,
        to: &RoomId,
    ) -> Result<RoomId, HandlerError> {
        let from = self
            .registry
            .session(conn)
            .ok_or(SessionError::NoActiveSession(conn))?
            .room
            .clone();
        if !self.rooms.contains(to) {
            return Err(SessionError::UnknownRoom(to.clone()).into());
        }
        if let Err(err) = self.rooms.transfer(conn, &from, to) {
            tracing::error!(%conn, %from, %to, error = %err, "room transfer failed");
            return Err(SessionError::UnknownRoom(to.clone()).into());
        }
        if let Some(session) = self.registry.session_mut(conn) {
            session.room = to.clone();
        }
        Ok(from)
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Fails with `MessageTooLarge` if `msg` would not fit in one frame.
    pub fn check_fits(&self, msg: &ServerMessage) -> Result<(), SessionError> {
        let len = self.codec.payload_len(msg);
        let max = self.codec.max_frame_len();
        if len > max {
            return Err(SessionError::MessageTooLarge { len, max });
        }
        Ok(())
    }

    /// Queues `msg` for one connection. Returns whether it was queued.
    ///
    /// Messages too large for a frame are logged and not queued.
    pub fn send(&mut self, conn: ConnectionId, msg: ServerMessage) -> bool {
        if let Err(err) = self.check_fits(&msg) {
            tracing::warn!(%conn, ty = ?msg.message_type(), error = %err, "outbound message dropped");
            return false;
        }
        self.deliver(conn, msg)
    }

    /// Queues `msg` for every member of `room` except `except`. Returns how
    /// many connections it was queued for.
    pub fn broadcast(
        &mut self,
        room: &RoomId,
        msg: ServerMessage,
        except: Option<ConnectionId>,
    ) -> usize {
        if let Err(err) = self.check_fits(&msg) {
            tracing::warn!(%room, ty = ?msg.message_type(), error = %err, "broadcast dropped");
            return 0;
        }
        let members = self.rooms.members(room);
        members
            .into_iter()
            .filter(|&m| Some(m) != except)
            .filter(|&m| self.deliver(m, msg.clone()))
            .count()
    }

    /// Sends `conn` the roster of `room` (without itself), split over as
    /// many `RoomRoster` frames as the frame limit needs. Returns the
    /// members listed.
    pub fn send_roster(&mut self, conn: ConnectionId, room: &RoomId) -> Vec<RosterEntry> {
        let members = self.roster(room, Some(conn));
        for frame in self.codec.roster_frames(room, members.clone()) {
            self.send(conn, frame);
        }
        members
    }

    fn deliver(&mut self, conn: ConnectionId, msg: ServerMessage) -> bool {
        match self.registry.send_to(conn, msg) {
            Delivery::Queued => true,
            Delivery::Full => {
                if !self.lagging.contains(&conn) {
                    self.lagging.push(conn);
                }
                false
            }
            Delivery::Closed => false,
        }
    }

    /// Roster of `room`, in connection id order, without `except`.
    pub fn roster(&self, room: &RoomId, except: Option<ConnectionId>) -> Vec<RosterEntry> {
        self.rooms
            .members(room)
            .into_iter()
            .filter(|&m| Some(m) != except)
            .filter_map(|m| self.registry.session(m))
            .map(PlayerSession::roster_entry)
            .collect()
    }

    /// Position of `conn`'s player, if it has one.
    pub fn position(&self, conn: ConnectionId) -> Option<Position> {
        self.session(conn).map(|s| s.position)
    }
}
