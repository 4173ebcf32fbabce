//! PubSub: ephemeral, node-local delivery hints over Redis (spec.md §4.3).
//! Unlike the Bus, PubSub has no durability or replay — it exists purely to
//! tell *this* node's Hub "a session for user X might be attached here,
//! check your registry", and carries the originating node's `instanceId`
//! so a node can skip re-publishing events it produced itself.

mod publisher;
mod subscriber;

pub use publisher::PubSubPublisher;
pub use subscriber::PubSubSubscriber;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PubSubError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The channel a given user's sessions are published under (spec.md §6.4).
pub fn channel_for_user(user_id: &str) -> String {
    format!("ws:user:{user_id}")
}
