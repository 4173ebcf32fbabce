//! Publishing side of PubSub (spec.md §4.3).

use chat_protocol::{Event, Frame, PubSubEnvelope};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::{PubSubError, channel_for_user};

#[derive(Clone)]
pub struct PubSubPublisher {
    conn: ConnectionManager,
    instance_id: String,
}

impl PubSubPublisher {
    pub fn new(conn: ConnectionManager, instance_id: String) -> Self {
        Self { conn, instance_id }
    }

    /// Publishes `event` to `user_id`'s channel, stamped with this node's
    /// `instanceId` (spec.md §6.4) so receiving nodes can tell whether they
    /// were the origin.
    pub async fn publish_to_user(&self, user_id: &str, event: &Event) -> Result<(), PubSubError> {
        let envelope = PubSubEnvelope {
            instance_id: self.instance_id.clone(),
            frame: Frame::from_event(event, chrono::Utc::now()),
        };
        let payload = serde_json::to_string(&envelope)?;

        let mut conn = self.conn.clone();
        let channel = channel_for_user(user_id);
        let _: () = conn.publish(&channel, payload).await?;

        Ok(())
    }
}
