//! Publishing side of the Bus (spec.md §4.2 `Publish`).

use chat_protocol::{Event, Frame};
use rdkafka::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use super::BusError;

/// Publishes events to the `chat_events` topic, keyed by routing key
/// (spec.md §4.3) so that all events for the same chat land in the same
/// partition and are therefore delivered in order to every consumer group.
#[derive(Clone)]
pub struct BusProducer {
    producer: FutureProducer,
    topic: String,
}

impl BusProducer {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, BusError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }

    /// Publishes `event`, keyed by its routing key (spec.md §4.3). Returns
    /// once the broker has acknowledged the write.
    pub async fn publish(&self, event: &Event) -> Result<(), BusError> {
        let frame = Frame::from_event(event, chrono::Utc::now());
        let payload = serde_json::to_vec(&frame)?;
        let key = event.routing_key();

        let record = FutureRecord::to(&self.topic).key(key).payload(&payload);

        self.producer
            .send(record, Timeout::After(std::time::Duration::from_secs(5)))
            .await
            .map_err(|(err, _)| BusError::Kafka(err))?;

        tracing::debug!(routing_key = key, "published event to bus");
        Ok(())
    }
}
