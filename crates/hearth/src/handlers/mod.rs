//! Message handlers, one module per concern.
//!
//! Handlers are plain functions over `&mut World`. They run on the tick
//! loop, change state through `World`'s atomic operations and queue their
//! replies and broadcasts; they never touch the network.

pub mod auth;
pub mod chat;
pub mod movement;
pub mod transition;
