//! `HearthServer` builder, accept loop and tick loop.
//!
//! ```text
//! accept loop ──spawn──→ reader task ─┐
//!             └─spawn──→ writer task  │ Inbound (unbounded mpsc)
//!                           ↑         ↓
//!          Outbound (bounded mpsc)    tick loop (owns World)
//! ```
//!
//! The tick loop is the single writer of all shared state. With a non-zero
//! tick rate it wakes once per tick and applies everything queued since the
//! last one; at rate 0 it applies each event as soon as it arrives.

use std::net::SocketAddr;
use std::sync::Arc;

use hearth_protocol::{ConnectionId, FrameCodec};
use hearth_session::{Authenticator, CredentialStore};
use hearth_tick::{TickConfig, TickScheduler};
use hearth_transport::{
    Connection, Transport, TransportError, WebSocketConnection, WebSocketTransport,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dispatcher::{Dispatcher, Flow, Inbound};
use crate::handler::{InboundSender, read_loop, write_loop};
use crate::{HearthError, NullPresenter, Presenter, ServerConfig, World};

/// Builder for configuring and starting a Hearth server.
///
/// # Example
///
/// ```rust,ignore
/// use hearth::prelude::*;
///
/// let store = MemoryCredentialStore::new().with_account("alice", "pw");
/// let server = HearthServerBuilder::new()
///     .config(ServerConfig::from_json_file("hearth.json")?)
///     .build(store)
///     .await?;
/// server.run().await
/// ```
pub struct HearthServerBuilder {
    config: ServerConfig,
    presenter: Box<dyn Presenter>,
}

impl HearthServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            presenter: Box::new(NullPresenter),
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides `config.bind_addr`.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn presenter(mut self, presenter: impl Presenter) -> Self {
        self.presenter = Box::new(presenter);
        self
    }

    /// Validates the config, builds the world and binds the listener.
    pub async fn build<S: CredentialStore>(
        self,
        store: S,
    ) -> Result<HearthServer<S>, HearthError> {
        let world = World::new(self.config.clone())?.with_boxed_presenter(self.presenter);
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        let auth = Arc::new(Authenticator::new(store, self.config.credential_timeout()));
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tracing::info!(
            addr = %transport.local_addr().map_err(TransportError::Bind)?,
            tick_rate_hz = self.config.tick_rate_hz,
            rooms = self.config.rooms.len(),
            "hearth server bound"
        );

        Ok(HearthServer {
            transport,
            codec: FrameCodec::new(self.config.max_frame_len),
            auth,
            tick: self.config.tick_config(),
            outbound_queue_len: self.config.outbound_queue_len,
            dispatcher: Dispatcher::new(world),
            inbound_tx,
            inbound_rx,
        })
    }
}

impl Default for HearthServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound, not yet running server.
pub struct HearthServer<S: CredentialStore> {
    transport: WebSocketTransport,
    codec: FrameCodec,
    auth: Arc<Authenticator<S>>,
    tick: TickConfig,
    outbound_queue_len: usize,
    dispatcher: Dispatcher,
    inbound_tx: InboundSender,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
}

impl<S: CredentialStore> HearthServer<S> {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle for issuing host commands once the server is running.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            tx: self.inbound_tx.clone(),
        }
    }

    /// Runs the accept loop and the tick loop until a shutdown command.
    ///
    /// Returns the final world state, with every connection removed.
    pub async fn run(self) -> Result<World, HearthError> {
        let Self {
            mut transport,
            codec,
            auth,
            tick,
            outbound_queue_len,
            dispatcher,
            inbound_tx,
            inbound_rx,
        } = self;

        let mut tick: JoinHandle<Dispatcher> =
            tokio::spawn(tick_loop(dispatcher, inbound_rx, tick));
        tracing::info!("hearth server running");

        loop {
            tokio::select! {
                finished = &mut tick => {
                    let dispatcher = finished.map_err(|_| HearthError::Stopped)?;
                    tracing::info!("hearth server stopped");
                    return Ok(dispatcher.into_world());
                }
                accepted = transport.accept() => match accepted {
                    Ok(conn) => spawn_connection(
                        conn,
                        codec,
                        outbound_queue_len,
                        Arc::clone(&auth),
                        &inbound_tx,
                    ),
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
            }
        }
    }
}

/// Queues the connection with the tick loop, then starts its tasks.
///
/// `Connect` is sent before the reader exists, so it is always the first
/// event for this id. The outbound queue holds at most `queue_len`
/// messages.
fn spawn_connection<S: CredentialStore>(
    conn: WebSocketConnection,
    codec: FrameCodec,
    queue_len: usize,
    auth: Arc<Authenticator<S>>,
    inbound: &InboundSender,
) {
    let conn_id = conn.id();
    let (out_tx, out_rx) = mpsc::channel(queue_len);
    if inbound
        .send(Inbound::Connect {
            conn: conn_id,
            sender: out_tx,
        })
        .is_err()
    {
        return;
    }

    let conn = Arc::new(conn);
    tokio::spawn(write_loop(Arc::clone(&conn), codec, out_rx));
    tokio::spawn(read_loop(conn, codec, auth, inbound.clone()));
    tracing::debug!(%conn_id, "connection tasks started");
}

/// The single writer. Runs until a `Shutdown` event.
async fn tick_loop(
    mut dispatcher: Dispatcher,
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
    tick: TickConfig,
) -> Dispatcher {
    let mut scheduler = TickScheduler::new(tick);

    if scheduler.is_event_driven() {
        while let Some(event) = inbound.recv().await {
            if dispatcher.apply(event) == Flow::Shutdown {
                break;
            }
        }
        return dispatcher;
    }

    'ticks: loop {
        let info = scheduler.wait_for_tick().await;
        let mut applied = 0usize;
        while let Ok(event) = inbound.try_recv() {
            applied += 1;
            if dispatcher.apply(event) == Flow::Shutdown {
                break 'ticks;
            }
        }
        scheduler.record_tick_end();
        if applied > 0 {
            tracing::trace!(tick = info.tick, applied, "tick applied");
        }
    }

    let m = scheduler.metrics();
    tracing::info!(
        ticks = m.total_ticks,
        overruns = m.total_overruns,
        skipped = m.total_skipped,
        budget_warnings = m.budget_warnings,
        max_tick_ms = m.max_tick_time.as_secs_f64() * 1000.0,
        "tick loop finished"
    );
    dispatcher
}

/// Cloneable handle for host commands.
///
/// Commands go through the same queue as client messages, so they are
/// applied on the tick like everything else.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    tx: InboundSender,
}

impl ServerHandle {
    /// Sends `Kick { reason }` to `conn` and removes it.
    pub fn kick(&self, conn: ConnectionId, reason: impl Into<String>) -> Result<(), HearthError> {
        self.tx
            .send(Inbound::Kick {
                conn,
                reason: reason.into(),
            })
            .map_err(|_| HearthError::Stopped)
    }

    /// Disconnects everyone and stops the server.
    pub fn shutdown(&self) -> Result<(), HearthError> {
        self.tx.send(Inbound::Shutdown).map_err(|_| HearthError::Stopped)
    }
}
