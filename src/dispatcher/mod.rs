//! The Dispatcher: the narrow bundle of collaborators that implement the
//! fan-out operations (spec.md §4.3). Deliberately not a single God struct —
//! Store, Bus, and PubSub stay separate types, composed here, so each can be
//! swapped or tested in isolation.

mod client_frame;

use std::sync::Arc;

use chat_protocol::{
    ChatKind, Event, Message, MessageKind, Role, StoryCreatedPayload, Story, TypingIndicatorPayload,
    UserPresencePayload,
};

use crate::bus::BusProducer;
use crate::error::{ApiError, ForbiddenKind};
use crate::hub::Registry;
use crate::pubsub::PubSubPublisher;
use crate::store::{NewChat, NewMessage, Store};

/// Collaborator bundle implementing every operation in spec.md §4.3.
pub struct Dispatcher {
    store: Store,
    bus: BusProducer,
    pubsub: PubSubPublisher,
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(store: Store, bus: BusProducer, pubsub: PubSubPublisher, registry: Arc<Registry>) -> Self {
        Self {
            store,
            bus,
            pubsub,
            registry,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// `CreatePersonalChat` (spec.md §4.3): idempotent on the unordered pair —
    /// returns the existing chat if the two users already share one.
    pub async fn create_personal_chat(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<chat_protocol::Chat, ApiError> {
        if user_a == user_b {
            return Err(ApiError::Forbidden(ForbiddenKind::SelfSend));
        }

        if let Some(existing) = self.store.chats().find_personal_chat(user_a, user_b).await? {
            return Ok(existing);
        }

        let mut tx = self.store.pool().begin().await?;
        let chat = self
            .store
            .chats()
            .create_tx(
                &mut tx,
                NewChat {
                    kind: ChatKind::Personal,
                    name: None,
                },
            )
            .await?;
        self.store.chats().add_member_tx(&mut tx, &chat.id, user_a, Role::Member).await?;
        self.store.chats().add_member_tx(&mut tx, &chat.id, user_b, Role::Member).await?;
        tx.commit().await?;

        Ok(chat)
    }

    /// `CreateChannel` (spec.md §4.3): the creator becomes the channel's
    /// first admin.
    pub async fn create_channel(
        &self,
        creator_id: &str,
        name: &str,
    ) -> Result<chat_protocol::Chat, ApiError> {
        if name.trim().is_empty() {
            return Err(ApiError::Validation("channel name must not be empty".into()));
        }

        let chat = self
            .store
            .chats()
            .create(NewChat {
                kind: ChatKind::Channel,
                name: Some(name),
            })
            .await?;
        self.store
            .chats()
            .add_member(&chat.id, creator_id, Role::Admin)
            .await?;

        Ok(chat)
    }

    /// `SendToChat` (spec.md §4.1): validates membership and block state,
    /// atomically clears the sender's own `blocked` flag and persists the
    /// message, then emits on both the Bus (durable, redundant) and PubSub
    /// (direct, low-latency) paths.
    pub async fn send_to_chat(
        &self,
        sender_id: &str,
        chat_id: &str,
        kind: MessageKind,
        content: &str,
        media_url: Option<&str>,
    ) -> Result<Message, ApiError> {
        use tracing::Instrument;
        let span = crate::telemetry::ChatTraceContext::new()
            .with_operation("send_to_chat")
            .with_chat_id(chat_id)
            .with_user_id(sender_id)
            .into_span();
        self.send_to_chat_inner(sender_id, chat_id, kind, content, media_url)
            .instrument(span)
            .await
    }

    async fn send_to_chat_inner(
        &self,
        sender_id: &str,
        chat_id: &str,
        kind: MessageKind,
        content: &str,
        media_url: Option<&str>,
    ) -> Result<Message, ApiError> {
        let membership = self
            .store
            .chats()
            .get_membership(chat_id, sender_id)
            .await?
            .ok_or(ApiError::Forbidden(ForbiddenKind::NotAMember))?;

        if membership.blocked {
            return Err(ApiError::Forbidden(ForbiddenKind::Blocked));
        }

        // `BEGIN IMMEDIATE` serializes concurrent senders on the same chat so
        // the blocked-flag clear and the message insert land atomically
        // (spec.md §4.3 edge case, §4.1 Store `SELECT ... FOR UPDATE` contract).
        let mut tx = self.store.pool().begin_with("BEGIN IMMEDIATE").await?;
        self.store
            .chats()
            .set_blocked_tx(&mut tx, chat_id, sender_id, false)
            .await?;
        let message = self
            .store
            .messages()
            .create(
                &mut *tx,
                NewMessage {
                    chat_id,
                    sender_id,
                    kind,
                    content,
                    media_url,
                },
            )
            .await?;
        tx.commit().await?;

        // After commit: the Bus carries the durable, redundant fan-out path
        // (spec.md §4.2); `deliver_to_user` to every other member is the
        // low-latency primary path (spec.md §4.1/§4.6). Both failures are
        // non-fatal — the message is already durable.
        if let Err(err) = self.bus.publish(&Event::MessageSent(message.clone())).await {
            tracing::warn!(chat_id, message_id = %message.id, error = %err, "bus publish failed after commit");
        }

        let members = self.store.chats().list_members(chat_id).await.unwrap_or_default();
        let event = Event::MessageSent(message.clone());
        for member in members.iter().filter(|m| m.user_id != sender_id) {
            self.deliver_to_user(&member.user_id, &event).await;
        }

        crate::metrics::MESSAGES_SENT.inc();
        Ok(message)
    }

    /// `SendToUser` (spec.md §4.3): sugar over `CreatePersonalChat` +
    /// `SendToChat`, enforcing the `BlockedByRecipient` edge case when the
    /// recipient has blocked the personal chat.
    pub async fn send_to_user(
        &self,
        sender_id: &str,
        recipient_id: &str,
        kind: MessageKind,
        content: &str,
        media_url: Option<&str>,
    ) -> Result<Message, ApiError> {
        let chat = self.create_personal_chat(sender_id, recipient_id).await?;

        let recipient_membership = self
            .store
            .chats()
            .get_membership(&chat.id, recipient_id)
            .await?
            .ok_or(ApiError::Forbidden(ForbiddenKind::NotAMember))?;
        if recipient_membership.blocked {
            return Err(ApiError::Forbidden(ForbiddenKind::BlockedByRecipient));
        }

        self.send_to_chat(sender_id, &chat.id, kind, content, media_url).await
    }

    /// `Block`/`Unblock` (spec.md §4.3): flips the caller's own membership
    /// block flag in `chat_id`.
    pub async fn set_blocked(&self, user_id: &str, chat_id: &str, blocked: bool) -> Result<(), ApiError> {
        let membership = self
            .store
            .chats()
            .get_membership(chat_id, user_id)
            .await?
            .ok_or(ApiError::Forbidden(ForbiddenKind::NotAMember))?;
        let _ = membership;
        self.store.chats().set_blocked(chat_id, user_id, blocked).await?;
        Ok(())
    }

    /// `MarkRead` (spec.md §4.3): publishes `message.read` so every member's
    /// other sessions can update their read cursor.
    pub async fn mark_read(&self, user_id: &str, chat_id: &str, message_id: &str) -> Result<(), ApiError> {
        self.store
            .chats()
            .get_membership(chat_id, user_id)
            .await?
            .ok_or(ApiError::Forbidden(ForbiddenKind::NotAMember))?;

        if self.store.messages().get(message_id).await?.is_none() {
            return Err(ApiError::NotFound(format!("message {message_id}")));
        }

        let event = Event::MessageRead(chat_protocol::MessageReadPayload {
            chat_id: chat_id.to_string(),
            message_id: message_id.to_string(),
            user_id: user_id.to_string(),
        });
        self.bus
            .publish(&event)
            .await
            .map_err(|e| ApiError::BusUnavailable(e.to_string()))?;

        Ok(())
    }

    /// `TypingIndicator` (spec.md §4.5 read loop): ephemeral, no Store write.
    /// Emitted to both the Bus (the Consumer's redundant fan-out path,
    /// spec.md §4.6) and directly over PubSub to every other member (the
    /// low-latency primary path) — the same dual-path shape as `SendToChat`.
    pub async fn send_typing_indicator(
        &self,
        user_id: &str,
        chat_id: &str,
        is_typing: bool,
    ) -> Result<(), ApiError> {
        self.store
            .chats()
            .get_membership(chat_id, user_id)
            .await?
            .ok_or(ApiError::Forbidden(ForbiddenKind::NotAMember))?;

        let event = Event::TypingIndicator(TypingIndicatorPayload {
            chat_id: chat_id.to_string(),
            user_id: user_id.to_string(),
            is_typing,
        });

        if let Err(err) = self.bus.publish(&event).await {
            tracing::warn!(chat_id, user_id, error = %err, "bus publish of typing indicator failed");
        }

        let members = self.store.chats().list_members(chat_id).await?;
        for member in members.iter().filter(|m| m.user_id != user_id) {
            self.deliver_to_user(&member.user_id, &event).await;
        }

        Ok(())
    }

    /// `CreateStory` (spec.md §4.3).
    pub async fn create_story(&self, user_id: &str, media_url: &str) -> Result<Story, ApiError> {
        if media_url.trim().is_empty() {
            return Err(ApiError::Validation("media_url must not be empty".into()));
        }
        let story = self.store.stories().create(user_id, media_url).await?;

        let event = Event::StoryCreated(StoryCreatedPayload {
            id: story.id.clone(),
            user_id: story.user_id.clone(),
            media_url: story.media_url.clone(),
        });
        self.bus
            .publish(&event)
            .await
            .map_err(|e| ApiError::BusUnavailable(e.to_string()))?;

        Ok(story)
    }

    /// `ListActiveStories` (spec.md §4.3).
    pub async fn list_active_stories(&self) -> Result<Vec<Story>, ApiError> {
        Ok(self.store.stories().list_active(chrono::Utc::now()).await?)
    }

    /// Fans a presence change out to the user's personal-chat contacts and
    /// channel co-members (spec.md §4.4 connect/disconnect): emitted to the
    /// Bus (`user.connected`/`user.disconnected`, spec.md §4.5 steps 2 and 6,
    /// §6.3) for downstream notification/archival consumers, and over
    /// PubSub to the user's own channel for any other same-identity session.
    async fn broadcast_presence(&self, user_id: &str, connected: bool) {
        let event = if connected {
            Event::UserConnected(UserPresencePayload {
                user_id: user_id.to_string(),
            })
        } else {
            Event::UserDisconnected(UserPresencePayload {
                user_id: user_id.to_string(),
            })
        };

        tracing::info!(user_id, connected, "user presence changed");
        if let Err(err) = self.bus.publish(&event).await {
            tracing::warn!(user_id, error = %err, "bus publish of presence change failed");
        }
        let _ = self.pubsub.publish_to_user(user_id, &event).await;
    }

    pub async fn note_user_connected(&self, user_id: &str) {
        self.broadcast_presence(user_id, true).await;
    }

    pub async fn note_user_disconnected(&self, user_id: &str) {
        self.broadcast_presence(user_id, false).await;
    }

    /// Delivers `frame` to any session this node holds for `user_id`. Used
    /// by both the Bus consumer loop and the PubSub subscriber loop.
    pub fn deliver_local(&self, user_id: &str, frame: chat_protocol::Frame) -> usize {
        crate::hub::deliver_local(&self.registry, user_id, frame)
    }

    /// `DeliverToUser` (spec.md §4.5): writes `event` to every session this
    /// node holds for `user_id`, then publishes it to `ws:user:<user_id>` so
    /// any other node holding a session for `user_id` can do the same. Local
    /// delivery happens first and unconditionally — a recipient on the same
    /// node as the sender is reached even if the PubSub (or Bus) publish
    /// below fails (spec.md §4.8: "PubSub path still delivers to live
    /// sessions on the emitting node").
    async fn deliver_to_user(&self, user_id: &str, event: &Event) {
        let frame = chat_protocol::Frame::from_event(event, chrono::Utc::now());
        self.deliver_local(user_id, frame);

        if let Err(err) = self.pubsub.publish_to_user(user_id, event).await {
            tracing::warn!(user_id, error = %err, "pubsub publish failed after local delivery");
        }
    }

    /// Handles a frame the client sent up over its WebSocket (spec.md §6.2):
    /// currently only `TYPING_INDICATOR` and `MESSAGE_READ` are accepted from
    /// the client side; everything else is server-to-client only.
    pub async fn handle_client_frame(&self, user_id: &str, raw: &str) -> Result<(), ApiError> {
        client_frame::handle(self, user_id, raw).await
    }
}
