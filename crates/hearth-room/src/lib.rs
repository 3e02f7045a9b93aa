//! Room membership for Hearth.
//!
//! A room is a named partition of the world. Movement and chat are scoped
//! to the sender's room, so the only state a room carries is the set of
//! connections inside it.
//!
//! # Key types
//!
//! - [`Room`] — one room and its member set
//! - [`RoomManager`] — the fixed set of rooms, membership changes, transfers
//!
//! The manager knows nothing about player sessions. Keeping a session's
//! `room` field in step with membership is the job of the layer that owns
//! both (see `hearth::World`).

mod error;
mod manager;
mod room;

pub use error::RoomError;
pub use manager::RoomManager;
pub use room::Room;
