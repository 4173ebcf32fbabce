//! Subscribing side of PubSub (spec.md §4.3): one pattern subscription for
//! `ws:user:*`, demultiplexed locally to whichever sessions the Hub's
//! registry holds for that user.

use chat_protocol::PubSubEnvelope;
use futures_util::StreamExt;
use redis::Client;

use super::PubSubError;

pub struct PubSubSubscriber {
    client: Client,
    instance_id: String,
}

/// A decoded PubSub message, already filtered for self-origin (spec.md §4.3
/// split-horizon: never re-deliver an event this node itself published).
pub struct PubSubMessage {
    pub user_id: String,
    pub envelope: PubSubEnvelope,
}

impl PubSubSubscriber {
    pub fn new(client: Client, instance_id: String) -> Self {
        Self { client, instance_id }
    }

    /// Runs the subscription loop, invoking `on_message` for every envelope
    /// not originated by this node. Returns only on a connection error; the
    /// caller is expected to retry with backoff.
    pub async fn run<F>(&self, mut on_message: F) -> Result<(), PubSubError>
    where
        F: FnMut(PubSubMessage) + Send,
    {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe("ws:user:*").await?;

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let channel: String = msg.get_channel_name().to_string();
            let payload: String = match msg.get_payload() {
                Ok(p) => p,
                Err(err) => {
                    tracing::warn!(error = %err, "dropping undecodable pubsub payload");
                    continue;
                }
            };

            let envelope: PubSubEnvelope = match serde_json::from_str(&payload) {
                Ok(e) => e,
                Err(err) => {
                    tracing::warn!(error = %err, "dropping malformed pubsub envelope");
                    continue;
                }
            };

            if envelope.instance_id == self.instance_id {
                crate::metrics::PUBSUB_SELF_ORIGIN_SKIPPED.inc();
                continue;
            }

            let Some(user_id) = channel.strip_prefix("ws:user:") else {
                continue;
            };

            on_message(PubSubMessage {
                user_id: user_id.to_string(),
                envelope,
            });
        }

        Ok(())
    }
}
