//! Per-connection network tasks.
//!
//! Each accepted connection gets two Tokio tasks:
//!
//! - the **reader** decodes frames and queues them for the tick loop, in
//!   arrival order. It runs credential checks itself, so a slow credential
//!   store stalls only its own connection and never the tick.
//! - the **writer** drains the connection's bounded outbound queue. The
//!   tick never waits on it; a client that falls a full queue behind is
//!   dropped.
//!
//! Neither task touches shared state. EOF or a transport error becomes one
//! [`Inbound::Disconnect`]; an undecodable frame becomes one
//! [`Inbound::Malformed`].

use std::sync::Arc;

use hearth_protocol::{ClientMessage, Codec, FrameCodec};
use hearth_session::{Authenticator, CredentialStore, Outbound};
use hearth_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::Inbound;

pub(crate) type InboundSender = mpsc::UnboundedSender<Inbound>;

/// Reads frames until the connection ends, then queues a disconnect, or a
/// `Malformed` event if the client broke the protocol.
pub(crate) async fn read_loop<S: CredentialStore>(
    conn: Arc<WebSocketConnection>,
    codec: FrameCodec,
    auth: Arc<Authenticator<S>>,
    inbound: InboundSender,
) {
    let conn_id = conn.id();

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed by peer");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv failed");
                break;
            }
        };

        let msg: ClientMessage = match codec.decode(&data) {
            Ok(msg) => msg,
            Err(error) => {
                tracing::debug!(%conn_id, %error, "undecodable frame");
                let _ = inbound.send(Inbound::Malformed { conn: conn_id, error });
                return;
            }
        };

        let event = match msg {
            ClientMessage::Login { username, password } => Inbound::Login {
                conn: conn_id,
                verdict: auth.verify(&username, &password).await,
            },
            msg => Inbound::Message { conn: conn_id, msg },
        };

        if inbound.send(event).is_err() {
            // Tick loop is gone; nothing left to report to.
            return;
        }
    }

    let _ = inbound.send(Inbound::Disconnect { conn: conn_id });
}

/// Writes queued messages until told to close or the queue is dropped.
pub(crate) async fn write_loop(
    conn: Arc<WebSocketConnection>,
    codec: FrameCodec,
    mut outbound: mpsc::Receiver<Outbound>,
) {
    let conn_id = conn.id();

    while let Some(item) = outbound.recv().await {
        let msg = match item {
            Outbound::Message(msg) => msg,
            Outbound::Close => break,
        };
        let bytes = match codec.encode(&msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(%conn_id, error = %e, "failed to encode outbound message");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed, stopping writer");
            break;
        }
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    tracing::debug!(%conn_id, "writer finished");
}
