//! The events that flow through the Bus and PubSub (spec.md §6.3/§6.4) and
//! are delivered to clients as wire frames (spec.md §6.2).

use serde::{Deserialize, Serialize};

use crate::entities::Message;

/// `{chatId, messageId, userId}` payload for `message.read` / `MESSAGE_READ`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReadPayload {
    pub chat_id: String,
    pub message_id: String,
    pub user_id: String,
}

/// `{chatId, userId, isTyping}` payload for `typing.indicator` / `TYPING_INDICATOR`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicatorPayload {
    pub chat_id: String,
    pub user_id: String,
    pub is_typing: bool,
}

/// `{userId}` payload for `user.connected` / `user.disconnected`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPresencePayload {
    pub user_id: String,
}

/// Payload for `message.sent` / `MESSAGE_SENT`: the persisted Message.
pub type MessageSentPayload = Message;

/// Payload for `story.created`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryCreatedPayload {
    pub id: String,
    pub user_id: String,
    pub media_url: String,
}

/// A fan-out event, tagged with its routing key / wire `type`. One variant
/// per routing key named in spec.md §4.3/§6.3.
#[derive(Debug, Clone)]
pub enum Event {
    MessageSent(MessageSentPayload),
    MessageRead(MessageReadPayload),
    TypingIndicator(TypingIndicatorPayload),
    UserConnected(UserPresencePayload),
    UserDisconnected(UserPresencePayload),
    StoryCreated(StoryCreatedPayload),
}

impl Event {
    /// The wire `type` field (spec.md §6.2), e.g. `MESSAGE_SENT`.
    pub fn wire_type(&self) -> &'static str {
        match self {
            Self::MessageSent(_) => "MESSAGE_SENT",
            Self::MessageRead(_) => "MESSAGE_READ",
            Self::TypingIndicator(_) => "TYPING_INDICATOR",
            Self::UserConnected(_) => "USER_CONNECTED",
            Self::UserDisconnected(_) => "USER_DISCONNECTED",
            Self::StoryCreated(_) => "STORY_CREATED",
        }
    }

    /// The Bus routing key (spec.md §4.3/§6.3), e.g. `message.sent`.
    pub fn routing_key(&self) -> &'static str {
        match self {
            Self::MessageSent(_) => "message.sent",
            Self::MessageRead(_) => "message.read",
            Self::TypingIndicator(_) => "typing.indicator",
            Self::UserConnected(_) => "user.connected",
            Self::UserDisconnected(_) => "user.disconnected",
            Self::StoryCreated(_) => "story.created",
        }
    }

    /// Serialize the payload half of the event to a JSON value.
    pub fn payload_json(&self) -> serde_json::Value {
        match self {
            Self::MessageSent(p) => serde_json::to_value(p),
            Self::MessageRead(p) => serde_json::to_value(p),
            Self::TypingIndicator(p) => serde_json::to_value(p),
            Self::UserConnected(p) => serde_json::to_value(p),
            Self::UserDisconnected(p) => serde_json::to_value(p),
            Self::StoryCreated(p) => serde_json::to_value(p),
        }
        .expect("event payloads are always representable as JSON")
    }

    /// The recipient-facing chat id for ordering/dedup purposes, when the
    /// event carries one.
    pub fn chat_id(&self) -> Option<&str> {
        match self {
            Self::MessageSent(m) => Some(&m.chat_id),
            Self::MessageRead(p) => Some(&p.chat_id),
            Self::TypingIndicator(p) => Some(&p.chat_id),
            Self::UserConnected(_) | Self::UserDisconnected(_) | Self::StoryCreated(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_type_and_routing_key_agree_in_shape() {
        let ev = Event::TypingIndicator(TypingIndicatorPayload {
            chat_id: "c1".into(),
            user_id: "u1".into(),
            is_typing: true,
        });
        assert_eq!(ev.wire_type(), "TYPING_INDICATOR");
        assert_eq!(ev.routing_key(), "typing.indicator");
        assert_eq!(ev.chat_id(), Some("c1"));
    }
}
