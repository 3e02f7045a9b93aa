//! End-to-end tests: a real server on a random port, real WebSocket
//! clients speaking the binary protocol.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use hearth::prelude::*;
use hearth::World;
use hearth_protocol::{
    ClientMessage, Codec, DEFAULT_MAX_FRAME_LEN, ErrorKind, FrameCodec, RejectReason, ServerMessage,
};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    handle: ServerHandle,
    task: JoinHandle<Result<World, HearthError>>,
}

fn accounts() -> MemoryCredentialStore {
    MemoryCredentialStore::new()
        .with_account("alice", "pw1")
        .with_account("bob", "pw2")
}

fn test_config(tick_rate_hz: u32) -> ServerConfig {
    ServerConfig {
        bind_addr: "127.0.0.1:0".into(),
        tick_rate_hz,
        spawn: hearth_session::SpawnBox::point(Position::new(0, 0)),
        ..ServerConfig::default()
    }
}

async fn start_with<S: CredentialStore>(config: ServerConfig, store: S) -> TestServer {
    let server = HearthServerBuilder::new()
        .config(config)
        .build(store)
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("should have local addr");
    let handle = server.handle();
    let task = tokio::spawn(server.run());
    TestServer { addr, handle, task }
}

async fn start_server() -> TestServer {
    start_with(test_config(0), accounts()).await
}

struct Client {
    ws: ClientWs,
    codec: FrameCodec,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        Self {
            ws,
            codec: FrameCodec::default(),
        }
    }

    async fn send(&mut self, msg: &ClientMessage) {
        let bytes = self.codec.encode(msg).expect("encode");
        self.send_raw(&bytes).await;
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.ws
            .send(Message::Binary(bytes.to_vec().into()))
            .await
            .expect("send");
    }

    /// Next server message, or `None` once the server closed the socket.
    async fn recv(&mut self) -> Option<ServerMessage> {
        loop {
            let frame = tokio::time::timeout(WAIT, self.ws.next())
                .await
                .expect("timed out waiting for server");
            match frame {
                Some(Ok(Message::Binary(data))) => {
                    return Some(self.codec.decode(&data).expect("valid frame"));
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
                Some(Ok(_)) => continue,
            }
        }
    }

    /// Skips messages until one matches.
    async fn recv_until(
        &mut self,
        mut pred: impl FnMut(&ServerMessage) -> bool,
    ) -> ServerMessage {
        loop {
            let msg = self.recv().await.expect("connection closed early");
            if pred(&msg) {
                return msg;
            }
        }
    }

    async fn login(&mut self, username: &str, password: &str) -> ServerMessage {
        self.send(&ClientMessage::Login {
            username: username.into(),
            password: password.into(),
        })
        .await;
        self.recv().await.expect("login reply")
    }

    /// Logs in and returns the assigned id, skipping the roster.
    async fn login_ok(&mut self, username: &str, password: &str) -> ConnectionId {
        match self.login(username, password).await {
            ServerMessage::LoginAccepted { id, .. } => {
                self.recv_until(|m| matches!(m, ServerMessage::RoomRoster { .. }))
                    .await;
                id
            }
            other => panic!("expected LoginAccepted, got {other:?}"),
        }
    }

    async fn expect_closed(&mut self) {
        while let Some(msg) = self.recv().await {
            if matches!(msg, ServerMessage::Kick { .. }) {
                continue;
            }
            panic!("expected close, got {msg:?}");
        }
    }
}

// =========================================================================
// Login
// =========================================================================

#[tokio::test]
async fn test_login_valid_credentials_spawns_player() {
    let server = start_server().await;
    let mut client = Client::connect(server.addr).await;

    let reply = client.login("Alice", "pw1").await;

    match reply {
        ServerMessage::LoginAccepted { name, room, position, .. } => {
            assert_eq!(name, "alice");
            assert_eq!(room, RoomId::new("town_square"));
            assert_eq!(position, Position::new(0, 0));
        }
        other => panic!("expected LoginAccepted, got {other:?}"),
    }
    assert!(matches!(
        client.recv().await,
        Some(ServerMessage::RoomRoster { members, .. }) if members.is_empty()
    ));
}

#[tokio::test]
async fn test_login_bad_password_rejected_then_retry_succeeds() {
    let server = start_server().await;
    let mut client = Client::connect(server.addr).await;

    let reply = client.login("alice", "wrong").await;
    assert_eq!(
        reply,
        ServerMessage::LoginRejected { reason: RejectReason::BadCredentials }
    );

    client.login_ok("alice", "pw1").await;
}

#[tokio::test]
async fn test_login_twice_is_already_logged_in() {
    let server = start_server().await;
    let mut client = Client::connect(server.addr).await;
    client.login_ok("alice", "pw1").await;

    let reply = client.login("alice", "pw1").await;

    assert_eq!(
        reply,
        ServerMessage::LoginRejected { reason: RejectReason::AlreadyLoggedIn }
    );
}

#[tokio::test]
async fn test_login_repeated_failures_kick_connection() {
    let mut config = test_config(0);
    config.max_auth_failures = 2;
    let server = start_with(config, accounts()).await;
    let mut client = Client::connect(server.addr).await;

    client.login("alice", "x").await;
    client.send(&ClientMessage::Login {
        username: "alice".into(),
        password: "y".into(),
    })
    .await;

    client
        .recv_until(|m| matches!(m, ServerMessage::Kick { .. }))
        .await;
    client.expect_closed().await;
}

/// A store that never answers.
struct StalledStore;

impl CredentialStore for StalledStore {
    async fn validate(&self, _: &str, _: &str) -> Result<Identity, CredentialError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_login_stalled_store_resolves_unavailable() {
    let mut config = test_config(0);
    config.credential_timeout_ms = 50;
    let server = start_with(config, StalledStore).await;
    let mut client = Client::connect(server.addr).await;

    let reply = client.login("alice", "pw1").await;

    assert_eq!(
        reply,
        ServerMessage::LoginRejected { reason: RejectReason::Unavailable }
    );
}

#[tokio::test]
async fn test_add_player_spawns_guest_when_allowed() {
    let mut config = test_config(0);
    config.allow_guests = true;
    let server = start_with(config, accounts()).await;
    let mut client = Client::connect(server.addr).await;

    client.send(&ClientMessage::AddPlayer).await;

    let reply = client.recv().await;
    assert!(matches!(
        reply,
        Some(ServerMessage::LoginAccepted { id, name, .. }) if name == format!("guest-{}", id.into_inner())
    ));
}

// =========================================================================
// Movement, rooms and chat
// =========================================================================

#[tokio::test]
async fn test_move_is_broadcast_to_room_including_mover() {
    let server = start_with(test_config(30), accounts()).await;
    let mut alice = Client::connect(server.addr).await;
    let mut bob = Client::connect(server.addr).await;
    let alice_id = alice.login_ok("alice", "pw1").await;
    bob.login_ok("bob", "pw2").await;

    alice.send(&ClientMessage::Move { key: Direction::Up }).await;

    let expected = ServerMessage::PositionUpdate {
        id: alice_id,
        position: Position::new(0, 1),
    };
    let seen_by_bob = bob
        .recv_until(|m| matches!(m, ServerMessage::PositionUpdate { .. }))
        .await;
    let seen_by_alice = alice
        .recv_until(|m| matches!(m, ServerMessage::PositionUpdate { .. }))
        .await;
    assert_eq!(seen_by_bob, expected);
    assert_eq!(seen_by_alice, expected);
}

#[tokio::test]
async fn test_change_room_notifies_and_unknown_room_errors() {
    let server = start_server().await;
    let mut alice = Client::connect(server.addr).await;
    let mut bob = Client::connect(server.addr).await;
    let alice_id = alice.login_ok("alice", "pw1").await;
    bob.login_ok("bob", "pw2").await;

    alice
        .send(&ClientMessage::ChangeRoom { room: RoomId::new("forest") })
        .await;
    let roster = alice
        .recv_until(|m| matches!(m, ServerMessage::RoomRoster { .. }))
        .await;
    assert!(matches!(
        roster,
        ServerMessage::RoomRoster { room, members } if room == RoomId::new("forest") && members.is_empty()
    ));
    let left = bob
        .recv_until(|m| matches!(m, ServerMessage::PlayerLeft { .. }))
        .await;
    assert_eq!(left, ServerMessage::PlayerLeft { id: alice_id });

    alice
        .send(&ClientMessage::ChangeRoom { room: RoomId::new("moon") })
        .await;
    assert!(matches!(
        alice.recv().await,
        Some(ServerMessage::Error { kind: hearth_protocol::ErrorKind::UnknownRoom, .. })
    ));
}

#[tokio::test]
async fn test_chat_private_message_reaches_target_only() {
    let server = start_server().await;
    let mut alice = Client::connect(server.addr).await;
    let mut bob = Client::connect(server.addr).await;
    let alice_id = alice.login_ok("alice", "pw1").await;
    let bob_id = bob.login_ok("bob", "pw2").await;
    alice
        .recv_until(|m| matches!(m, ServerMessage::PlayerJoined { .. }))
        .await;

    alice
        .send(&ClientMessage::Chat { target: Some(bob_id), text: "hi bob".into() })
        .await;
    alice
        .send(&ClientMessage::Chat { target: None, text: "hi room".into() })
        .await;

    let first = bob.recv().await;
    assert_eq!(
        first,
        Some(ServerMessage::ChatDelivery {
            from: alice_id,
            name: "alice".into(),
            text: "hi bob".into(),
            private: true,
        })
    );
    // Alice's own first chat line is the room broadcast, not the private one.
    let own = alice.recv().await;
    assert!(matches!(
        own,
        Some(ServerMessage::ChatDelivery { text, private: false, .. }) if text == "hi room"
    ));
}

#[tokio::test]
async fn test_chat_too_large_to_deliver_answers_error_and_keeps_connection() {
    let server = start_server().await;
    let mut alice = Client::connect(server.addr).await;
    alice.login_ok("alice", "pw1").await;

    // Fits as a Chat, overflows once the sender's id and name are added.
    let text = "x".repeat(DEFAULT_MAX_FRAME_LEN - 3);
    alice.send(&ClientMessage::Chat { target: None, text }).await;
    alice
        .send(&ClientMessage::Chat { target: None, text: "short".into() })
        .await;

    assert!(matches!(
        alice.recv().await,
        Some(ServerMessage::Error { kind: ErrorKind::MessageTooLarge, .. })
    ));
    assert!(matches!(
        alice.recv().await,
        Some(ServerMessage::ChatDelivery { text, .. }) if text == "short"
    ));
}

// =========================================================================
// Disconnects, protocol errors and host commands
// =========================================================================

#[tokio::test]
async fn test_disconnect_notifies_room() {
    let server = start_server().await;
    let mut alice = Client::connect(server.addr).await;
    let mut bob = Client::connect(server.addr).await;
    alice.login_ok("alice", "pw1").await;
    let bob_id = bob.login_ok("bob", "pw2").await;

    drop(bob);

    let left = alice
        .recv_until(|m| matches!(m, ServerMessage::PlayerLeft { .. }))
        .await;
    assert_eq!(left, ServerMessage::PlayerLeft { id: bob_id });
}

#[tokio::test]
async fn test_unknown_type_tag_drops_connection() {
    let server = start_server().await;
    let mut client = Client::connect(server.addr).await;

    client.send_raw(&[0x42, 0x00]).await;

    client.expect_closed().await;
}

#[tokio::test]
async fn test_client_sent_kick_drops_connection() {
    let server = start_server().await;
    let mut client = Client::connect(server.addr).await;
    client.login_ok("alice", "pw1").await;

    // Kick tag, one-byte payload: empty reason string.
    client.send_raw(&[0x07, 0x01, 0x00]).await;

    client.expect_closed().await;
}

#[tokio::test]
async fn test_host_kick_delivers_reason_then_closes() {
    let server = start_server().await;
    let mut client = Client::connect(server.addr).await;
    let id = client.login_ok("alice", "pw1").await;

    server.handle.kick(id, "maintenance").unwrap();

    let kick = client
        .recv_until(|m| matches!(m, ServerMessage::Kick { .. }))
        .await;
    assert_eq!(kick, ServerMessage::Kick { reason: "maintenance".into() });
    client.expect_closed().await;
}

#[tokio::test]
async fn test_shutdown_returns_empty_world() {
    let server = start_with(test_config(30), accounts()).await;
    let mut client = Client::connect(server.addr).await;
    client.login_ok("alice", "pw1").await;

    server.handle.shutdown().unwrap();
    let world = tokio::time::timeout(WAIT, server.task)
        .await
        .expect("server should stop")
        .expect("task should not panic")
        .expect("run should succeed");

    assert!(world.registry().is_empty());
    assert_eq!(world.rooms().member_count(), 0);
    client.expect_closed().await;
}
