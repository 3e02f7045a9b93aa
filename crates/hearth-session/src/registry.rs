//! The connection registry: every live connection and its player session.
//!
//! A single map keyed by [`ConnectionId`] holds the lifecycle state, the
//! outbound queue and the optional [`PlayerSession`] for each connection.
//! Removing a connection is one `HashMap::remove`, so the registry and the
//! session store cannot drift apart.
//!
//! # Concurrency note
//!
//! `Registry` is a plain struct with no locking. It is owned by the tick
//! loop, which is the only writer; network tasks reach it only by queueing
//! events.

use std::collections::HashMap;

use hearth_protocol::{ConnectionId, ServerMessage};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::{PlayerSession, SessionError};

/// What the tick loop hands to a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message(ServerMessage),
    /// Flush what is queued, then close the transport.
    Close,
}

/// Queue feeding a connection's writer task.
///
/// Bounded, and only ever written with `try_send`, so a slow client never
/// blocks the tick and never grows the server's memory.
pub type ClientSender = mpsc::Sender<Outbound>;

/// Result of queueing one message for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// The writer is not keeping up; the message was not queued.
    Full,
    /// Unknown connection, or its writer is gone.
    Closed,
}

/// Lifecycle of a connection.
///
/// ```text
/// Connecting ──(login accepted)──→ Authenticated
///     │                                  │
///     └──────────(deregister)────────────┴──→ Disconnected (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticated,
    Disconnected,
}

/// One registered connection.
#[derive(Debug)]
pub struct ConnectionEntry {
    id: ConnectionId,
    state: ConnectionState,
    sender: ClientSender,
    session: Option<PlayerSession>,
    auth_failures: u32,
}

impl ConnectionEntry {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&self) -> Option<&PlayerSession> {
        self.session.as_ref()
    }

    /// Consumes the entry, yielding the session it carried.
    pub fn into_session(self) -> Option<PlayerSession> {
        self.session
    }

    pub fn auth_failures(&self) -> u32 {
        self.auth_failures
    }

    /// Queues a message for the writer task without waiting.
    pub fn send(&self, msg: ServerMessage) -> Delivery {
        match self.sender.try_send(Outbound::Message(msg)) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Asks the writer task to close the transport after flushing.
    ///
    /// If the queue is full the request is dropped; the writer still stops
    /// once the entry, and with it the last sender, is dropped.
    pub fn close(&self) {
        let _ = self.sender.try_send(Outbound::Close);
    }
}

/// All live connections.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<ConnectionId, ConnectionEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly accepted connection in `Connecting`.
    ///
    /// # Errors
    /// [`SessionError::DuplicateConnection`] if `id` is already live; the
    /// existing entry is left untouched.
    pub fn register(
        &mut self,
        id: ConnectionId,
        sender: ClientSender,
    ) -> Result<&ConnectionEntry, SessionError> {
        use std::collections::hash_map::Entry;

        match self.entries.entry(id) {
            Entry::Occupied(_) => Err(SessionError::DuplicateConnection(id)),
            Entry::Vacant(slot) => {
                tracing::debug!(%id, "connection registered");
                Ok(slot.insert(ConnectionEntry {
                    id,
                    state: ConnectionState::Connecting,
                    sender,
                    session: None,
                    auth_failures: 0,
                }))
            }
        }
    }

    /// Removes a connection together with its session.
    ///
    /// The returned entry is already marked `Disconnected`. Unknown ids
    /// return `None`.
    pub fn remove(&mut self, id: ConnectionId) -> Option<ConnectionEntry> {
        let mut entry = self.entries.remove(&id)?;
        entry.state = ConnectionState::Disconnected;
        tracing::debug!(%id, had_session = entry.session.is_some(), "connection removed");
        Some(entry)
    }

    pub fn is_live(&self, id: ConnectionId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Lifecycle state; unknown ids are `Disconnected`.
    pub fn state(&self, id: ConnectionId) -> ConnectionState {
        self.entries
            .get(&id)
            .map_or(ConnectionState::Disconnected, |e| e.state)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&ConnectionEntry> {
        self.entries.get(&id)
    }

    pub fn session(&self, id: ConnectionId) -> Option<&PlayerSession> {
        self.entries.get(&id).and_then(|e| e.session.as_ref())
    }

    pub fn session_mut(&mut self, id: ConnectionId) -> Option<&mut PlayerSession> {
        self.entries.get_mut(&id).and_then(|e| e.session.as_mut())
    }

    /// Binds a session to its connection and moves it to `Authenticated`.
    ///
    /// # Errors
    /// [`SessionError::NotConnecting`] unless the connection is live and
    /// still `Connecting`. Nothing changes on error.
    pub fn attach_session(
        &mut self,
        session: PlayerSession,
    ) -> Result<&PlayerSession, SessionError> {
        let id = session.connection_id;
        let Some(entry) = self.entries.get_mut(&id) else {
            return Err(SessionError::NotConnecting {
                id,
                state: ConnectionState::Disconnected,
            });
        };
        if entry.state != ConnectionState::Connecting {
            return Err(SessionError::NotConnecting {
                id,
                state: entry.state,
            });
        }

        entry.state = ConnectionState::Authenticated;
        tracing::info!(%id, name = %session.display_name, "session attached");
        Ok(entry.session.insert(session))
    }

    /// Counts a failed auth attempt and returns the new total.
    pub fn record_auth_failure(&mut self, id: ConnectionId) -> u32 {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.auth_failures += 1;
                entry.auth_failures
            }
            None => 0,
        }
    }

    /// Queues `msg` for one connection. Unknown ids report `Closed`.
    pub fn send_to(&self, id: ConnectionId, msg: ServerMessage) -> Delivery {
        self.entries
            .get(&id)
            .map_or(Delivery::Closed, |e| e.send(msg))
    }

    /// All live sessions, in no particular order.
    pub fn sessions(&self) -> impl Iterator<Item = &PlayerSession> {
        self.entries.values().filter_map(|e| e.session.as_ref())
    }

    /// Ids of all live connections, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.entries.keys().copied()
    }

    /// Number of live connections in any state.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of connections in `Authenticated`.
    pub fn authenticated_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.state == ConnectionState::Authenticated)
            .count()
    }
}

// =========================================================================
// Tests
// =========================================================================
