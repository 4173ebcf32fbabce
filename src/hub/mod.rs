//! The Hub: owns WebSocket sessions on this node and the registry mapping
//! users to their live sessions (spec.md §4.4).

mod registry;
mod session;

pub use registry::{Registry, SessionHandle, SessionId};

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocket;

use chat_protocol::Frame;

use crate::dispatcher::Dispatcher;

/// Accepts an upgraded WebSocket for an already-authenticated `user_id`,
/// registers it, and drives its event loop until it closes.
pub async fn handle_socket(
    socket: WebSocket,
    user_id: String,
    registry: Arc<Registry>,
    dispatcher: Arc<Dispatcher>,
    session_queue_capacity: usize,
    ping_interval: Duration,
) {
    let (handle, outbox) = registry.register(&user_id, session_queue_capacity);
    let session_id = handle.id;
    crate::metrics::CONNECTED_SESSIONS.inc();

    dispatcher.note_user_connected(&user_id).await;

    session::run_session(
        socket,
        user_id,
        registry,
        dispatcher,
        outbox,
        session_id,
        ping_interval,
    )
    .await;
}

/// Delivers `frame` to every local session for `user_id`. Used both by the
/// Dispatcher (direct local delivery) and by the Bus/PubSub consumer loops
/// (remote-origin delivery).
pub fn deliver_local(registry: &Registry, user_id: &str, frame: Frame) -> usize {
    registry.deliver_to_user(user_id, Arc::new(frame))
}
