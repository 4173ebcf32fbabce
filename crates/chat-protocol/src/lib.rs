//! Wire types shared by the chat fan-out core and anything that speaks to it:
//! the JSON frame exchanged over the client WebSocket, the envelope carried
//! on the Bus, and the envelope carried on PubSub.
//!
//! Kept as its own crate (rather than folded into the server binary) so a
//! client SDK or a downstream Bus consumer can depend on the wire shapes
//! without pulling in the server's Store/Bus/PubSub/Hub implementations.

mod entities;
mod event;
mod frame;

pub use entities::{Chat, ChatKind, Membership, Message, MessageKind, PresenceStatus, Role, Story, User};
pub use event::{
    Event, MessageReadPayload, MessageSentPayload, StoryCreatedPayload, TypingIndicatorPayload,
    UserPresencePayload,
};
pub use frame::{Frame, PubSubEnvelope};
