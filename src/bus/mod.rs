//! The Bus: a durable, ordered-per-key event log used to fan events out to
//! every node (spec.md §4.2). Kafka stands in for "a durable queue with a
//! routing key"; one consumer group per node gives every node a full replay,
//! and manual offset commits after successful delivery stand in for the
//! spec's "manual ack" requirement.

mod consumer;
mod producer;

pub use consumer::{BusConsumer, BusMessage};
pub use producer::BusProducer;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
