//! The dispatcher: routes queued events to handlers on the tick loop.
//!
//! Network tasks never touch the [`World`]. They turn what they see into an
//! [`Inbound`] event and queue it; the tick loop hands each event to
//! [`Dispatcher::apply`] in arrival order.
//!
//! Per-connection gating follows the connection's state:
//!
//! | State           | Accepted                                 |
//! |-----------------|------------------------------------------|
//! | `Connecting`    | `Login`, `AddPlayer`                     |
//! | `Authenticated` | `Move`, `Chat`, `ChangeRoom`, `Logout`   |
//! | `Disconnected`  | nothing; every event is a no-op          |
//!
//! `Login`/`AddPlayer` while `Authenticated` answer `AlreadyLoggedIn`;
//! session messages while `Connecting` answer `NoActiveSession`.
//!
//! After every event, connections whose outbound queue overflowed are
//! removed.

use hearth_protocol::{ClientMessage, ConnectionId, ProtocolError, ServerMessage};
use hearth_session::{AuthError, ClientSender, ConnectionState, Identity};

use crate::handlers::{auth, chat, movement, transition};
use crate::{HandlerError, World};

/// Everything the tick loop can be asked to do.
#[derive(Debug)]
pub enum Inbound {
    /// A connection was accepted; `sender` feeds its writer task.
    Connect {
        conn: ConnectionId,
        sender: ClientSender,
    },
    /// The transport closed or failed.
    Disconnect { conn: ConnectionId },
    /// The client sent a frame that does not decode. The connection is
    /// dropped.
    Malformed {
        conn: ConnectionId,
        error: ProtocolError,
    },
    /// A `Login` whose credentials the reader task has already checked.
    Login {
        conn: ConnectionId,
        verdict: Result<Identity, AuthError>,
    },
    /// Any other decoded client message.
    Message {
        conn: ConnectionId,
        msg: ClientMessage,
    },
    /// Host-issued kick.
    Kick {
        conn: ConnectionId,
        reason: String,
    },
    /// Host-issued shutdown: drop everyone and stop the tick loop.
    Shutdown,
}

impl Inbound {
    /// The connection the event concerns, if any.
    pub fn conn(&self) -> Option<ConnectionId> {
        match self {
            Self::Connect { conn, .. }
            | Self::Disconnect { conn }
            | Self::Malformed { conn, .. }
            | Self::Login { conn, .. }
            | Self::Message { conn, .. }
            | Self::Kick { conn, .. } => Some(*conn),
            Self::Shutdown => None,
        }
    }
}

/// Whether the tick loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

/// Owns the world and applies events to it.
#[derive(Debug)]
pub struct Dispatcher {
    world: World,
}

impl Dispatcher {
    pub fn new(world: World) -> Self {
        Self { world }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn into_world(self) -> World {
        self.world
    }

    /// Applies one event. Handler failures are reported to the client and
    /// logged here; none of them stop the loop.
    pub fn apply(&mut self, event: Inbound) -> Flow {
        let flow = self.handle(event);
        if flow == Flow::Continue {
            let evicted = self.world.evict_lagging();
            if evicted > 0 {
                tracing::debug!(evicted, "slow connections removed");
            }
        }
        flow
    }

    fn handle(&mut self, event: Inbound) -> Flow {
        let result = match event {
            Inbound::Connect { conn, sender } => {
                if let Err(err) = self.world.connect(conn, sender) {
                    tracing::error!(%conn, error = %err, "rejecting duplicate connection id");
                }
                return Flow::Continue;
            }
            Inbound::Disconnect { conn } => {
                self.world.deregister(conn);
                return Flow::Continue;
            }
            Inbound::Kick { conn, reason } => {
                self.world.kick(conn, &reason);
                return Flow::Continue;
            }
            Inbound::Shutdown => {
                tracing::info!(connections = self.world.registry().len(), "shutting down");
                self.world.clear();
                return Flow::Shutdown;
            }
            Inbound::Login { conn, verdict } => {
                auth::login(&mut self.world, conn, verdict).map(drop).map_err(|e| (conn, e))
            }
            Inbound::Message { conn, msg } => self.route(conn, msg).map_err(|e| (conn, e)),
            Inbound::Malformed { conn, error } => Err((conn, HandlerError::Protocol(error))),
        };

        if let Err((conn, err)) = result {
            self.report(conn, err);
        }
        Flow::Continue
    }

    fn route(&mut self, conn: ConnectionId, msg: ClientMessage) -> Result<(), HandlerError> {
        let state = self.world.state(conn);
        tracing::debug!(%conn, ?state, ty = ?msg.message_type(), "dispatch");

        if state == ConnectionState::Disconnected {
            return Err(HandlerError::Disconnected(conn));
        }

        match msg {
            ClientMessage::Login { .. } => {
                // Logins reach the tick as `Inbound::Login` with a verdict.
                tracing::warn!(%conn, "unverified login dropped");
                Ok(())
            }
            ClientMessage::AddPlayer => auth::add_player(&mut self.world, conn).map(drop),
            ClientMessage::Logout => auth::logout(&mut self.world, conn),
            ClientMessage::Move { key } => {
                movement::apply_input(&mut self.world, conn, key).map(drop)
            }
            ClientMessage::Chat { target, text } => {
                chat::relay(&mut self.world, conn, target, text).map(drop)
            }
            ClientMessage::ChangeRoom { room } => {
                transition::switch_room(&mut self.world, conn, room).map(drop)
            }
        }
    }

    fn report(&mut self, conn: ConnectionId, err: HandlerError) {
        match &err {
            HandlerError::Disconnected(_) => {
                tracing::trace!(%conn, "event for disconnected connection ignored");
            }
            HandlerError::Protocol(e) => {
                tracing::warn!(%conn, error = %e, "protocol error, dropping connection");
                self.world.deregister(conn);
            }
            HandlerError::Session(e) => {
                tracing::warn!(%conn, error = %e, "message dropped");
                if let Some(kind) = err.client_kind() {
                    self.world.send(
                        conn,
                        ServerMessage::Error {
                            kind,
                            detail: e.to_string(),
                        },
                    );
                }
            }
            HandlerError::Auth(AuthError::Unavailable(_)) => {}
            HandlerError::Auth(_) => {
                let failures = self.world.record_auth_failure(conn);
                let max = self.world.config().max_auth_failures;
                if max > 0 && failures >= max {
                    self.world.kick(conn, "too many failed login attempts");
                }
            }
        }
    }
}
