//! Core protocol types for Hearth's wire format.
//!
//! Client-bound and server-bound messages are separate enums so that a
//! client can never produce a server-only message (such as `Kick`) that
//! the dispatcher would have to reject at runtime.

use std::fmt;

use hearth_transport::ConnectionId;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity and world types
// ---------------------------------------------------------------------------

/// Name of a room (a partition of the world, e.g. `"town_square"`).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Creates a room id from any string-like value.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the room name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// An authoritative 2D position in world units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns this position moved by one `step` in `direction`.
    ///
    /// Saturates at the `i32` range instead of wrapping.
    pub fn stepped(self, direction: Direction, step: i32) -> Self {
        let (dx, dy) = direction.unit();
        Self {
            x: self.x.saturating_add(dx.saturating_mul(step)),
            y: self.y.saturating_add(dy.saturating_mul(step)),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A movement key. Clients send intents, never coordinates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Unit displacement: `Up` is +y, `Right` is +x.
    pub const fn unit(self) -> (i32, i32) {
        match self {
            Self::Up => (0, 1),
            Self::Down => (0, -1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }

    pub(crate) const fn to_byte(self) -> u8 {
        match self {
            Self::Up => 0,
            Self::Down => 1,
            Self::Left => 2,
            Self::Right => 3,
        }
    }

    pub(crate) fn from_byte(b: u8) -> Result<Self, ProtocolError> {
        match b {
            0 => Ok(Self::Up),
            1 => Ok(Self::Down),
            2 => Ok(Self::Left),
            3 => Ok(Self::Right),
            other => Err(ProtocolError::InvalidValue {
                field: "direction",
                value: other as u32,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Type tags
// ---------------------------------------------------------------------------

/// The one-byte type tag that opens every frame.
///
/// `0x01..=0x07` mirror the client message table (`Kick` is the only one
/// that flows server→client); `0x81..` are server-only replies and
/// broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Login = 0x01,
    Logout = 0x02,
    AddPlayer = 0x03,
    Chat = 0x04,
    Move = 0x05,
    ChangeRoom = 0x06,
    Kick = 0x07,
    LoginAccepted = 0x81,
    LoginRejected = 0x82,
    PlayerJoined = 0x83,
    PlayerLeft = 0x84,
    PositionUpdate = 0x85,
    RoomRoster = 0x86,
    ChatDelivery = 0x87,
    Error = 0x88,
}

impl MessageType {
    /// Returns the wire byte.
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// `true` for tags a client is allowed to send.
    pub const fn is_server_bound(self) -> bool {
        matches!(
            self,
            Self::Login
                | Self::Logout
                | Self::AddPlayer
                | Self::Chat
                | Self::Move
                | Self::ChangeRoom
        )
    }
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self, ProtocolError> {
        Ok(match tag {
            0x01 => Self::Login,
            0x02 => Self::Logout,
            0x03 => Self::AddPlayer,
            0x04 => Self::Chat,
            0x05 => Self::Move,
            0x06 => Self::ChangeRoom,
            0x07 => Self::Kick,
            0x81 => Self::LoginAccepted,
            0x82 => Self::LoginRejected,
            0x83 => Self::PlayerJoined,
            0x84 => Self::PlayerLeft,
            0x85 => Self::PositionUpdate,
            0x86 => Self::RoomRoster,
            0x87 => Self::ChatDelivery,
            0x88 => Self::Error,
            other => return Err(ProtocolError::UnknownType(other)),
        })
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Messages a client may send.
///
/// None of them carry the sender's connection id: the dispatcher binds
/// that from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Login { username: String, password: String },
    Logout,
    /// Ask for a default spawn without credentials (guest play).
    AddPlayer,
    /// `target: None` broadcasts to the sender's room.
    Chat {
        target: Option<ConnectionId>,
        text: String,
    },
    Move { key: Direction },
    ChangeRoom { room: RoomId },
}

impl ClientMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Login { .. } => MessageType::Login,
            Self::Logout => MessageType::Logout,
            Self::AddPlayer => MessageType::AddPlayer,
            Self::Chat { .. } => MessageType::Chat,
            Self::Move { .. } => MessageType::Move,
            Self::ChangeRoom { .. } => MessageType::ChangeRoom,
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Why a login or spawn request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    BadCredentials,
    AlreadyLoggedIn,
    /// The credential store could not answer in time; retrying may work.
    Unavailable,
}

impl RejectReason {
    pub(crate) const fn to_byte(self) -> u8 {
        match self {
            Self::BadCredentials => 1,
            Self::AlreadyLoggedIn => 2,
            Self::Unavailable => 3,
        }
    }

    pub(crate) fn from_byte(b: u8) -> Result<Self, ProtocolError> {
        match b {
            1 => Ok(Self::BadCredentials),
            2 => Ok(Self::AlreadyLoggedIn),
            3 => Ok(Self::Unavailable),
            other => Err(ProtocolError::InvalidValue {
                field: "reject reason",
                value: other as u32,
            }),
        }
    }
}

/// Category of a dropped, non-fatal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoActiveSession,
    UnknownRoom,
    /// The reply or broadcast would not fit in one frame.
    MessageTooLarge,
}

impl ErrorKind {
    pub(crate) const fn to_byte(self) -> u8 {
        match self {
            Self::NoActiveSession => 1,
            Self::UnknownRoom => 2,
            Self::MessageTooLarge => 3,
        }
    }

    pub(crate) fn from_byte(b: u8) -> Result<Self, ProtocolError> {
        match b {
            1 => Ok(Self::NoActiveSession),
            2 => Ok(Self::UnknownRoom),
            3 => Ok(Self::MessageTooLarge),
            other => Err(ProtocolError::InvalidValue {
                field: "error kind",
                value: other as u32,
            }),
        }
    }
}

/// One player as seen by the other members of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: ConnectionId,
    pub name: String,
    pub position: Position,
}

/// Messages the server sends: replies, broadcasts and kicks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Your login succeeded; this is where you spawned.
    LoginAccepted {
        id: ConnectionId,
        name: String,
        room: RoomId,
        position: Position,
    },
    LoginRejected { reason: RejectReason },
    /// Another player arrived in your room.
    PlayerJoined { entry: RosterEntry },
    /// Another player left your room.
    PlayerLeft { id: ConnectionId },
    PositionUpdate { id: ConnectionId, position: Position },
    /// Who else is in `room`, sent after spawning or switching rooms.
    ///
    /// A roster too large for one frame arrives as several consecutive
    /// `RoomRoster` messages for the same room, each with a disjoint slice
    /// of the members.
    RoomRoster {
        room: RoomId,
        members: Vec<RosterEntry>,
    },
    ChatDelivery {
        from: ConnectionId,
        name: String,
        text: String,
        /// `true` when addressed only to the receiver.
        private: bool,
    },
    Error { kind: ErrorKind, detail: String },
    Kick { reason: String },
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::LoginAccepted { .. } => MessageType::LoginAccepted,
            Self::LoginRejected { .. } => MessageType::LoginRejected,
            Self::PlayerJoined { .. } => MessageType::PlayerJoined,
            Self::PlayerLeft { .. } => MessageType::PlayerLeft,
            Self::PositionUpdate { .. } => MessageType::PositionUpdate,
            Self::RoomRoster { .. } => MessageType::RoomRoster,
            Self::ChatDelivery { .. } => MessageType::ChatDelivery,
            Self::Error { .. } => MessageType::Error,
            Self::Kick { .. } => MessageType::Kick,
        }
    }
}
