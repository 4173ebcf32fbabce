//! Session registry: which WebSocket sessions belong to which user, on this
//! node (spec.md §4.4). A user may have more than one session (multiple
//! devices); every delivery fans out to all of them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use chat_protocol::Frame;

pub type SessionId = Uuid;

/// Outbound half of a session: a bounded FIFO queue feeding its WebSocket
/// write task. Bounded so a slow consumer can't grow memory unboundedly
/// (spec.md §4.4 slow-consumer handling).
#[derive(Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    sender: mpsc::Sender<Arc<Frame>>,
}

impl SessionHandle {
    /// Enqueues `frame` for delivery. Returns `false` if the session's queue
    /// is full or the session has gone away — the caller treats this as the
    /// session being dead and the registry entry is pruned separately.
    pub fn try_send(&self, frame: Arc<Frame>) -> bool {
        self.sender.try_send(frame).is_ok()
    }
}

/// Per-user, per-node set of live sessions. Registered under fine-grained
/// per-key locking (`DashMap`'s shard locks) so registry operations never
/// need a global lock held across a Store/Bus/PubSub/socket call.
#[derive(Default)]
pub struct Registry {
    sessions: DashMap<String, Vec<SessionHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session for `user_id`, returning its outbound queue's
    /// receiving half for the session's write task to drain.
    pub fn register(&self, user_id: &str, queue_capacity: usize) -> (SessionHandle, mpsc::Receiver<Arc<Frame>>) {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let handle = SessionHandle {
            id: Uuid::new_v4(),
            sender: tx,
        };
        self.sessions
            .entry(user_id.to_string())
            .or_default()
            .push(handle.clone());
        (handle, rx)
    }

    /// Removes a single session when it disconnects, pruning the user's
    /// entry entirely once its session list is empty.
    pub fn unregister(&self, user_id: &str, session_id: SessionId) {
        if let Some(mut sessions) = self.sessions.get_mut(user_id) {
            sessions.retain(|s| s.id != session_id);
            if sessions.is_empty() {
                drop(sessions);
                self.sessions.remove(user_id);
            }
        }
    }

    /// Fans `frame` out to every live session for `user_id` on this node.
    /// Returns the number of sessions it was actually delivered to.
    pub fn deliver_to_user(&self, user_id: &str, frame: Arc<Frame>) -> usize {
        let Some(sessions) = self.sessions.get(user_id) else {
            return 0;
        };
        sessions.iter().filter(|s| s.try_send(frame.clone())).count()
    }

    /// Whether any session for `user_id` is attached to this node — used to
    /// decide whether a PubSub hint is even worth acting on.
    pub fn has_local_session(&self, user_id: &str) -> bool {
        self.sessions.contains_key(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_protocol::{Event, UserPresencePayload};

    #[test]
    fn deliver_reaches_all_sessions_for_a_user() {
        let registry = Registry::new();
        let (_h1, mut r1) = registry.register("u1", 8);
        let (_h2, mut r2) = registry.register("u1", 8);

        let event = Event::UserConnected(UserPresencePayload {
            user_id: "u1".into(),
        });
        let frame = Arc::new(Frame::from_event(&event, chrono::Utc::now()));

        let delivered = registry.deliver_to_user("u1", frame);
        assert_eq!(delivered, 2);
        assert!(r1.try_recv().is_ok());
        assert!(r2.try_recv().is_ok());
    }

    #[test]
    fn unregister_prunes_empty_user_entries() {
        let registry = Registry::new();
        let (handle, _rx) = registry.register("u1", 8);
        assert!(registry.has_local_session("u1"));

        registry.unregister("u1", handle.id);
        assert!(!registry.has_local_session("u1"));
    }
}
