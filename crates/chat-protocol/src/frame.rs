//! The JSON envelopes themselves (spec.md §6.2/§6.3/§6.4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Event;

/// `{ "type": "<EVENT_TYPE>", "payload": <object>, "timestamp": "<ISO-8601>" }`
///
/// The frame sent to clients over the WebSocket, and the envelope carried on
/// the Bus (spec.md §6.3 reuses the wire envelope verbatim).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl Frame {
    pub fn from_event(event: &Event, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: event.wire_type().to_string(),
            payload: event.payload_json(),
            timestamp,
        }
    }
}

/// The PubSub envelope (spec.md §6.4): the wire frame plus the originating
/// node's instance id, used for loop prevention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubSubEnvelope {
    pub instance_id: String,
    #[serde(flatten)]
    pub frame: Frame,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, UserPresencePayload};

    #[test]
    fn frame_round_trips_through_json() {
        let event = Event::UserConnected(UserPresencePayload {
            user_id: "u1".into(),
        });
        let frame = Frame::from_event(&event, Utc::now());
        let json = serde_json::to_string(&frame).unwrap();
        let back: Frame = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, "USER_CONNECTED");
        assert_eq!(back.payload["userId"], serde_json::json!("u1"));
    }

    #[test]
    fn pubsub_envelope_flattens_frame_fields() {
        let event = Event::UserConnected(UserPresencePayload {
            user_id: "u1".into(),
        });
        let envelope = PubSubEnvelope {
            instance_id: "node-1".into(),
            frame: Frame::from_event(&event, Utc::now()),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["instanceId"], serde_json::json!("node-1"));
        assert_eq!(json["type"], serde_json::json!("USER_CONNECTED"));
    }
}
