//! Per-connection plumbing: the read loop, the writer task, and the
//! outbound queue handle.
//!
//! Every connection gets a bounded mpsc queue drained by a single writer
//! task that owns the WebSocket sink. All frames destined for a connection
//! go through that queue, which serialises writes without holding any lock
//! across network I/O. A download enqueues its whole frame sequence as one
//! batch, so no broadcast can interleave with it.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use protocol::ids::new_device_id;
use protocol::messages::ServerFrame;

use crate::hub::Hub;
use crate::janitor;
use crate::net::broadcast;
use crate::net::handlers;

/// Depth of each connection's outbound queue.
pub(crate) const OUTBOUND_QUEUE_DEPTH: usize = 256;

/// One unit of outbound work for the writer task.
#[derive(Debug)]
pub(crate) enum Outbound {
    /// A single frame.
    Frame(Message),
    /// A sequence sent back-to-back with nothing interleaved.
    Batch(Vec<Message>),
}

/// Cloneable sender half of a connection's outbound queue.
#[derive(Debug, Clone)]
pub struct ConnHandle {
    tx: mpsc::Sender<Outbound>,
}

impl ConnHandle {
    /// Serialize and enqueue a control frame, waiting for queue space.
    ///
    /// Returns `false` if the connection is gone; callers treat that the
    /// same as any other send failure and leave the close path to the
    /// connection itself.
    pub async fn send(&self, frame: &ServerFrame) -> bool {
        match frame.to_json() {
            Ok(text) => self
                .tx
                .send(Outbound::Frame(Message::Text(text)))
                .await
                .is_ok(),
            Err(e) => {
                warn!(error = %e, "failed to serialize control frame");
                false
            }
        }
    }

    /// Enqueue an already serialized control frame without waiting.
    ///
    /// Used by the broadcaster: a slow or wedged peer must never stall
    /// fan-out to the others, so a full queue drops the frame for that
    /// peer instead of blocking.
    pub fn try_send_text(&self, text: String) -> bool {
        self.tx.try_send(Outbound::Frame(Message::Text(text))).is_ok()
    }

    /// Enqueue a frame sequence that must reach the wire contiguously.
    pub async fn send_batch(&self, frames: Vec<Message>) -> bool {
        self.tx.send(Outbound::Batch(frames)).await.is_ok()
    }

    /// A handle wired to a bare channel, for exercising session and
    /// janitor logic without a socket.
    #[cfg(test)]
    pub(crate) fn channel() -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        (Self { tx }, rx)
    }
}

/// Protocol state of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConnState {
    /// Connected, device id assigned, not yet in a session. Only
    /// `create_session`, `join_session`, and `ping` are honoured.
    Unregistered,
    /// Member of the session with this code; full protocol available.
    InSession(String),
}

/// Drive one WebSocket connection from accept to close.
pub(crate) async fn handle_socket(hub: Arc<Hub>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Outbound>(OUTBOUND_QUEUE_DEPTH);
    let handle = ConnHandle { tx };
    let device_id = new_device_id();

    debug!(device_id = %device_id, "connection opened");

    // Writer task: sole owner of the sink. Exits when every handle clone
    // is dropped or the peer stops accepting writes.
    let writer = tokio::spawn(async move {
        while let Some(out) = rx.recv().await {
            match out {
                Outbound::Frame(msg) => {
                    if sink.send(msg).await.is_err() {
                        return;
                    }
                }
                Outbound::Batch(msgs) => {
                    for msg in msgs {
                        if sink.send(msg).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
        let _ = sink.close().await;
    });

    let mut state = ConnState::Unregistered;
    while let Some(result) = stream.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                debug!(device_id = %device_id, error = %e, "connection error");
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                handlers::handle_control(&hub, &handle, &device_id, &mut state, &text).await;
            }
            Message::Binary(data) => {
                handlers::handle_binary(&hub, &handle, &device_id, &state, data.into()).await;
            }
            // The WebSocket layer answers pings on its own.
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => break,
        }
    }

    disconnect(&hub, &device_id, &state);

    // Dropping our handle (and the one held by the session membership we
    // just removed) lets the writer drain and exit.
    drop(handle);
    let _ = writer.await;
}

/// Close path: remove the device from its session and tell the peers.
fn disconnect(hub: &Arc<Hub>, device_id: &str, state: &ConnState) {
    let ConnState::InSession(code) = state else {
        debug!(device_id = %device_id, "unregistered connection closed");
        return;
    };

    let Some(outcome) = hub.registry.leave(device_id) else {
        return;
    };

    info!(
        device_id = %device_id,
        session_code = %code,
        remaining = outcome.remaining,
        "device disconnected"
    );

    broadcast::broadcast(
        &outcome.session,
        &ServerFrame::DeviceLeft {
            device_id: device_id.to_string(),
            total_devices: outcome.remaining,
        },
        None,
    );

    if outcome.became_empty {
        janitor::schedule_empty_check(Arc::clone(hub), code.clone());
    }
}
