//! The per-connection event loop (spec.md §4.4): reads client frames,
//! forwards them to the Dispatcher, and writes whatever the registry queues
//! for this session — mirroring the read/write `tokio::select!` shape used
//! for the IRC connection loop this crate is descended from.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use chat_protocol::Frame;

use crate::dispatcher::Dispatcher;
use crate::hub::registry::{Registry, SessionId};

/// Outcome of one iteration of the session's `tokio::select!` loop.
enum SelectResult {
    Outgoing(Arc<Frame>),
    Incoming(WsMessage),
    Ping,
    Closed,
}

/// Drives one WebSocket connection until it closes. Never holds the
/// registry lock across a socket write — the registry hands back an owned
/// queue receiver up front and nothing else is shared.
pub async fn run_session(
    socket: WebSocket,
    user_id: String,
    registry: Arc<Registry>,
    dispatcher: Arc<Dispatcher>,
    mut outbox: mpsc::Receiver<Arc<Frame>>,
    session_id: SessionId,
    ping_interval: Duration,
) {
    let (mut sink, mut stream) = socket.split();
    let mut ping_timer = tokio::time::interval(ping_interval);
    ping_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let result = tokio::select! {
            frame = outbox.recv() => match frame {
                Some(frame) => SelectResult::Outgoing(frame),
                None => SelectResult::Closed,
            },
            msg = stream.next() => match msg {
                Some(Ok(msg)) => SelectResult::Incoming(msg),
                Some(Err(err)) => {
                    tracing::debug!(user_id, error = %err, "websocket read error");
                    SelectResult::Closed
                }
                None => SelectResult::Closed,
            },
            _ = ping_timer.tick() => SelectResult::Ping,
        };

        match result {
            SelectResult::Outgoing(frame) => {
                let text = match serde_json::to_string(&*frame) {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::warn!(user_id, error = %err, "failed to encode outgoing frame");
                        continue;
                    }
                };
                if sink.send(WsMessage::Text(text.into())).await.is_err() {
                    break;
                }
            }
            SelectResult::Incoming(WsMessage::Text(text)) => {
                if let Err(err) = dispatcher.handle_client_frame(&user_id, &text).await {
                    tracing::debug!(user_id, error = %err, "client frame rejected");
                }
            }
            SelectResult::Incoming(WsMessage::Ping(payload)) => {
                if sink.send(WsMessage::Pong(payload)).await.is_err() {
                    break;
                }
            }
            SelectResult::Incoming(WsMessage::Close(_)) => break,
            SelectResult::Incoming(_) => {}
            SelectResult::Ping => {
                if sink.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
            SelectResult::Closed => break,
        }
    }

    registry.unregister(&user_id, session_id);
    crate::metrics::CONNECTED_SESSIONS.dec();
    dispatcher.note_user_disconnected(&user_id).await;
}
