use std::collections::BTreeMap;
use std::path::Path;

use hearth::prelude::*;

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

/// Stands in for a game client's scene: writes every world event to the log.
struct LogPresenter;

impl Presenter for LogPresenter {
    fn player_spawned(&mut self, conn: ConnectionId, name: &str, room: &RoomId, position: Position) {
        tracing::info!(%conn, %name, %room, %position, "spawn avatar");
    }

    fn player_moved(&mut self, conn: ConnectionId, position: Position) {
        tracing::debug!(%conn, %position, "move avatar");
    }

    fn player_left(&mut self, conn: ConnectionId, room: &RoomId) {
        tracing::info!(%conn, %room, "despawn avatar");
    }

    fn room_loaded(&mut self, conn: ConnectionId, room: &RoomId) {
        tracing::info!(%conn, %room, "load room");
    }

    fn chat_rendered(&mut self, from: ConnectionId, target: Option<ConnectionId>, text: &str) {
        match target {
            Some(to) => tracing::info!(%from, %to, "[whisper] {text}"),
            None => tracing::info!(%from, "[say] {text}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// Reads `{ "username": "password", ... }`.
fn load_accounts(path: &Path) -> Result<MemoryCredentialStore, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let accounts: BTreeMap<String, String> = serde_json::from_str(&text)?;
    Ok(accounts
        .into_iter()
        .fold(MemoryCredentialStore::new(), |store, (user, pass)| {
            store.with_account(&user, pass)
        }))
}

fn load_config() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    match std::env::var("HEARTH_CONFIG") {
        Ok(path) => Ok(ServerConfig::from_json_file(path)?),
        Err(_) => Ok(ServerConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    hearth::init_tracing();

    let config = load_config()?;
    let store = match std::env::var("HEARTH_ACCOUNTS") {
        Ok(path) => load_accounts(Path::new(&path))?,
        Err(_) => MemoryCredentialStore::new()
            .with_account("alice", "wonderland")
            .with_account("bob", "builder"),
    };
    tracing::info!(accounts = store.len(), "credential store ready");

    let server = HearthServerBuilder::new()
        .config(config)
        .presenter(LogPresenter)
        .build(store)
        .await?;

    let handle = server.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received");
            let _ = handle.shutdown();
        }
    });

    let world = server.run().await?;
    tracing::info!(rooms = world.rooms().room_count(), "bye");
    Ok(())
}
