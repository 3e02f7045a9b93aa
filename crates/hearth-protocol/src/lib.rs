//! Wire protocol for Hearth.
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`MessageType`], ...) —
//!   what travels between client and server.
//! - **Codec** ([`Codec`] trait, [`FrameCodec`]) — the
//!   `[type][varint length][payload]` framing.
//! - **Errors** ([`ProtocolError`]) — malformed or unknown frames.
//!
//! The protocol layer knows nothing about sessions or rooms; it only turns
//! bytes into typed messages and back.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Dispatcher (session state)
//! ```

mod codec;
mod error;
mod types;
pub mod varint;

pub use codec::{Codec, DEFAULT_MAX_FRAME_LEN, FrameCodec, PayloadReader, WireMessage};
pub use error::ProtocolError;
pub use hearth_transport::ConnectionId;
pub use types::{
    ClientMessage, Direction, ErrorKind, MessageType, Position, RejectReason,
    RoomId, RosterEntry, ServerMessage,
};
