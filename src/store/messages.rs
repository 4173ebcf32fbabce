//! Append-only message history (spec.md §3 `Message`, §4.3 pagination).

use chat_protocol::{Message, MessageKind};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::DbError;

/// Pagination is clamped server-side (spec.md §6.1: `limit` clamped to
/// ≤100, default 50).
pub const MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_PAGE_SIZE: i64 = 50;

pub struct NewMessage<'a> {
    pub chat_id: &'a str,
    pub sender_id: &'a str,
    pub kind: MessageKind,
    pub content: &'a str,
    pub media_url: Option<&'a str>,
}

pub struct MessageRepository<'a> {
    pool: &'a SqlitePool,
}

fn kind_to_str(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Text => "text",
        MessageKind::Image => "image",
        MessageKind::Video => "video",
        MessageKind::Audio => "audio",
        MessageKind::Document => "document",
        MessageKind::Location => "location",
    }
}

fn kind_from_str(s: &str) -> MessageKind {
    match s {
        "image" => MessageKind::Image,
        "video" => MessageKind::Video,
        "audio" => MessageKind::Audio,
        "document" => MessageKind::Document,
        "location" => MessageKind::Location,
        _ => MessageKind::Text,
    }
}

type MessageRow = (String, String, String, String, String, Option<String>, DateTime<Utc>);

fn row_to_message(row: MessageRow) -> Message {
    let (id, chat_id, sender_id, kind, content, media_url, created_at) = row;
    Message {
        id,
        chat_id,
        sender_id,
        kind: kind_from_str(&kind),
        content,
        media_url,
        created_at,
    }
}

impl<'a> MessageRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Persists a message. Executed inside the caller's transaction when the
    /// Dispatcher needs to serialize it with a block check (spec.md §4.3
    /// `SendToChat`/`SendToUser`).
    pub async fn create(
        &self,
        executor: impl sqlx::SqliteExecutor<'_>,
        new_message: NewMessage<'_>,
    ) -> Result<Message, DbError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO messages (id, chat_id, sender_id, type, content, media_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(new_message.chat_id)
        .bind(new_message.sender_id)
        .bind(kind_to_str(new_message.kind))
        .bind(new_message.content)
        .bind(new_message.media_url)
        .bind(now)
        .execute(executor)
        .await?;

        Ok(Message {
            id,
            chat_id: new_message.chat_id.to_string(),
            sender_id: new_message.sender_id.to_string(),
            kind: new_message.kind,
            content: new_message.content.to_string(),
            media_url: new_message.media_url.map(str::to_string),
            created_at: now,
        })
    }

    pub async fn get(&self, message_id: &str) -> Result<Option<Message>, DbError> {
        let row: Option<MessageRow> = sqlx::query_as(
            "SELECT id, chat_id, sender_id, type, content, media_url, created_at FROM messages WHERE id = ?",
        )
        .bind(message_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(row_to_message))
    }

    /// A page of `chat_id`'s history, returned in ascending chronological
    /// order (spec.md §6.1), clamped to [`MAX_PAGE_SIZE`] with a `limit=0`
    /// edge case returning an empty page (spec.md §8). `before` is an
    /// ISO-8601 timestamp scoping the page to strictly older messages, for
    /// backward paging from the most recent page.
    pub async fn list_page(
        &self,
        chat_id: &str,
        before: Option<DateTime<Utc>>,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, DbError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(0, MAX_PAGE_SIZE);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows: Vec<MessageRow> = match before {
            Some(before_ts) => {
                sqlx::query_as(
                    r#"
                    SELECT id, chat_id, sender_id, type, content, media_url, created_at
                    FROM (
                        SELECT id, chat_id, sender_id, type, content, media_url, created_at
                        FROM messages
                        WHERE chat_id = ? AND created_at < ?
                        ORDER BY created_at DESC, id DESC
                        LIMIT ?
                    )
                    ORDER BY created_at ASC, id ASC
                    "#,
                )
                .bind(chat_id)
                .bind(before_ts)
                .bind(limit)
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT id, chat_id, sender_id, type, content, media_url, created_at
                    FROM (
                        SELECT id, chat_id, sender_id, type, content, media_url, created_at
                        FROM messages
                        WHERE chat_id = ?
                        ORDER BY created_at DESC, id DESC
                        LIMIT ?
                    )
                    ORDER BY created_at ASC, id ASC
                    "#,
                )
                .bind(chat_id)
                .bind(limit)
                .fetch_all(self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(row_to_message).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewChat, Store};
    use chat_protocol::ChatKind;

    async fn seed_chat(store: &Store) -> String {
        store
            .chats()
            .create(NewChat {
                kind: ChatKind::Channel,
                name: Some("general"),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let store = Store::connect("sqlite::memory:", 5).await.unwrap();
        let chat_id = seed_chat(&store).await;
        let repo = store.messages();
        let created = repo
            .create(
                store.pool(),
                NewMessage {
                    chat_id: &chat_id,
                    sender_id: "u1",
                    kind: MessageKind::Text,
                    content: "hi",
                    media_url: None,
                },
            )
            .await
            .unwrap();

        let found = repo.get(&created.id).await.unwrap().unwrap();
        assert_eq!(found.content, "hi");
    }

    #[tokio::test]
    async fn list_page_clamps_to_max_and_orders_ascending() {
        let store = Store::connect("sqlite::memory:", 5).await.unwrap();
        let chat_id = seed_chat(&store).await;
        let repo = store.messages();
        for i in 0..5 {
            repo.create(
                store.pool(),
                NewMessage {
                    chat_id: &chat_id,
                    sender_id: "u1",
                    kind: MessageKind::Text,
                    content: &format!("msg{i}"),
                    media_url: None,
                },
            )
            .await
            .unwrap();
        }

        // The most recent 2 of 5, still rendered oldest-first (spec.md §6.1).
        let page = repo.list_page(&chat_id, None, Some(2)).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].content, "msg3");
        assert_eq!(page[1].content, "msg4");

        let page = repo.list_page(&chat_id, None, Some(100_000)).await.unwrap();
        assert!(page.len() <= MAX_PAGE_SIZE as usize);
        assert_eq!(page.len(), 5);
        assert_eq!(page[0].content, "msg0");
    }

    #[tokio::test]
    async fn list_page_limit_zero_is_empty() {
        let store = Store::connect("sqlite::memory:", 5).await.unwrap();
        let chat_id = seed_chat(&store).await;
        let repo = store.messages();
        repo.create(
            store.pool(),
            NewMessage {
                chat_id: &chat_id,
                sender_id: "u1",
                kind: MessageKind::Text,
                content: "hi",
                media_url: None,
            },
        )
        .await
        .unwrap();

        let page = repo.list_page(&chat_id, None, Some(0)).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn before_oldest_timestamp_returns_empty() {
        let store = Store::connect("sqlite::memory:", 5).await.unwrap();
        let chat_id = seed_chat(&store).await;
        let repo = store.messages();
        let oldest = repo
            .create(
                store.pool(),
                NewMessage {
                    chat_id: &chat_id,
                    sender_id: "u1",
                    kind: MessageKind::Text,
                    content: "hi",
                    media_url: None,
                },
            )
            .await
            .unwrap();

        let page = repo
            .list_page(&chat_id, Some(oldest.created_at), None)
            .await
            .unwrap();
        assert!(page.is_empty());
    }
}
