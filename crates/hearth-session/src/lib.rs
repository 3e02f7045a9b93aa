//! Connection and player-session state for Hearth.
//!
//! This crate owns the data that must never disagree:
//!
//! 1. **Connection Registry** — every live connection, its lifecycle state
//!    and its outbound queue ([`Registry`])
//! 2. **Player Session Store** — the authenticated player bound to a
//!    connection ([`PlayerSession`]), stored *inside* the registry entry so
//!    removing a connection removes its session in the same operation
//! 3. **Authentication** — credential lookups against an external
//!    [`CredentialStore`], bounded by a timeout ([`Authenticator`])
//!
//! # How it fits in the stack
//!
//! ```text
//! World / Dispatcher (above)  ← composes registry + rooms atomically
//!     ↕
//! Session Layer (this crate)  ← connection lifecycle and player identity
//!     ↕
//! Protocol Layer (below)  ← ConnectionId, Position, RoomId, ServerMessage
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod registry;
mod session;
mod spawn;

pub use auth::{
    Authenticator, CredentialError, CredentialStore, Identity,
    MemoryCredentialStore, normalize_username,
};
pub use error::{AuthError, SessionError};
pub use registry::{
    ClientSender, ConnectionEntry, ConnectionState, Delivery, Outbound, Registry,
};
pub use session::PlayerSession;
pub use spawn::SpawnBox;
