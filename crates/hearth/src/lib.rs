//! # Hearth
//!
//! Authoritative session core for small multiplayer worlds.
//!
//! Clients connect over WebSocket, log in against a [`CredentialStore`],
//! walk around a set of rooms and chat. The server owns every position and
//! every room membership; clients only send intents.
//!
//! ## Layers
//!
//! ```text
//! hearth            ← World, handlers, Dispatcher, server loop (this crate)
//!  ├─ hearth-session  ← connection registry, player sessions, credentials
//!  ├─ hearth-room     ← room membership
//!  ├─ hearth-tick     ← fixed-timestep scheduler
//!  └─ hearth-protocol ← binary frames
//!      └─ hearth-transport ← WebSocket connections
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hearth::prelude::*;
//!
//! # async fn run() -> Result<(), HearthError> {
//! hearth::init_tracing();
//! let store = MemoryCredentialStore::new().with_account("alice", "pw");
//! let server = HearthServerBuilder::new()
//!     .config(ServerConfig::default())
//!     .build(store)
//!     .await?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod dispatcher;
mod error;
mod handler;
pub mod handlers;
mod presenter;
mod server;
mod world;

pub use config::{ConfigError, ServerConfig};
pub use dispatcher::{Dispatcher, Flow, Inbound};
pub use error::{HandlerError, HearthError};
pub use presenter::{NullPresenter, Presenter};
pub use server::{HearthServer, HearthServerBuilder, ServerHandle};
pub use world::World;

pub use hearth_session::{CredentialStore, CredentialError, Identity, MemoryCredentialStore};

/// Installs a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

pub mod prelude {
    pub use crate::{
        CredentialError, CredentialStore, HearthError, HearthServer,
        HearthServerBuilder, Identity, MemoryCredentialStore, NullPresenter,
        Presenter, ServerConfig, ServerHandle,
    };
    pub use hearth_protocol::{ConnectionId, Direction, Position, RoomId};
}
