//! Chats and memberships (spec.md §3 `Chat`/`Membership`).

use chat_protocol::{Chat, ChatKind, Membership, Role};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{DbError, is_unique_violation};

pub struct NewChat<'a> {
    pub kind: ChatKind,
    pub name: Option<&'a str>,
}

pub struct ChatRepository<'a> {
    pool: &'a SqlitePool,
}

fn kind_to_str(kind: ChatKind) -> &'static str {
    match kind {
        ChatKind::Personal => "personal",
        ChatKind::Channel => "channel",
    }
}

fn kind_from_str(s: &str) -> ChatKind {
    match s {
        "channel" => ChatKind::Channel,
        _ => ChatKind::Personal,
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::Member => "member",
    }
}

fn role_from_str(s: &str) -> Role {
    match s {
        "admin" => Role::Admin,
        _ => Role::Member,
    }
}

impl<'a> ChatRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates a chat row. Membership rows are inserted separately by the
    /// caller (the Dispatcher composes this with `add_member` inside a
    /// transaction for `CreatePersonalChat`/`CreateChannel`).
    pub async fn create(&self, new_chat: NewChat<'_>) -> Result<Chat, DbError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query("INSERT INTO chats (id, type, name, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(kind_to_str(new_chat.kind))
            .bind(new_chat.name)
            .bind(now)
            .execute(self.pool)
            .await?;

        Ok(Chat {
            id,
            kind: new_chat.kind,
            name: new_chat.name.map(str::to_string),
            created_at: now,
        })
    }

    /// Same as [`Self::create`], executed inside the caller's open
    /// transaction so chat creation and its initial memberships commit
    /// atomically (`CreatePersonalChat`, spec.md §4.3).
    pub async fn create_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        new_chat: NewChat<'_>,
    ) -> Result<Chat, DbError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query("INSERT INTO chats (id, type, name, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(kind_to_str(new_chat.kind))
            .bind(new_chat.name)
            .bind(now)
            .execute(&mut **tx)
            .await?;

        Ok(Chat {
            id,
            kind: new_chat.kind,
            name: new_chat.name.map(str::to_string),
            created_at: now,
        })
    }

    pub async fn get(&self, chat_id: &str) -> Result<Option<Chat>, DbError> {
        let row: Option<(String, String, Option<String>, DateTime<Utc>)> =
            sqlx::query_as("SELECT id, type, name, created_at FROM chats WHERE id = ?")
                .bind(chat_id)
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(|(id, kind, name, created_at)| Chat {
            id,
            kind: kind_from_str(&kind),
            name,
            created_at,
        }))
    }

    /// The pre-existing `personal` chat between two users, if any (spec.md §3
    /// invariant: at most one personal chat per unordered user pair).
    pub async fn find_personal_chat(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Option<Chat>, DbError> {
        let row: Option<(String, String, Option<String>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT c.id, c.type, c.name, c.created_at
            FROM chats c
            JOIN chat_members m1 ON m1.chat_id = c.id AND m1.user_id = ?
            JOIN chat_members m2 ON m2.chat_id = c.id AND m2.user_id = ?
            WHERE c.type = 'personal'
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(id, kind, name, created_at)| Chat {
            id,
            kind: kind_from_str(&kind),
            name,
            created_at,
        }))
    }

    pub async fn add_member(
        &self,
        chat_id: &str,
        user_id: &str,
        role: Role,
    ) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO chat_members (chat_id, user_id, role, blocked) VALUES (?, ?, ?, 0)",
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(role_to_str(role))
        .execute(self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::AlreadyExists(format!("{user_id} is already a member of {chat_id}"))
            } else {
                DbError::Sqlx(e)
            }
        })?;
        Ok(())
    }

    /// Same as [`Self::add_member`], executed inside the caller's open
    /// transaction (see [`Self::create_tx`]).
    pub async fn add_member_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        chat_id: &str,
        user_id: &str,
        role: Role,
    ) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO chat_members (chat_id, user_id, role, blocked) VALUES (?, ?, ?, 0)",
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(role_to_str(role))
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::AlreadyExists(format!("{user_id} is already a member of {chat_id}"))
            } else {
                DbError::Sqlx(e)
            }
        })?;
        Ok(())
    }

    pub async fn get_membership(
        &self,
        chat_id: &str,
        user_id: &str,
    ) -> Result<Option<Membership>, DbError> {
        let row: Option<(String, bool)> = sqlx::query_as(
            "SELECT role, blocked FROM chat_members WHERE chat_id = ? AND user_id = ?",
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(role, blocked)| Membership {
            chat_id: chat_id.to_string(),
            user_id: user_id.to_string(),
            role: role_from_str(&role),
            blocked,
        }))
    }

    /// Every chat `user_id` currently belongs to (spec.md §6.1 `GET
    /// /api/chats`), most recently created first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Chat>, DbError> {
        let rows: Vec<(String, String, Option<String>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT c.id, c.type, c.name, c.created_at
            FROM chats c
            JOIN chat_members m ON m.chat_id = c.id
            WHERE m.user_id = ?
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, kind, name, created_at)| Chat {
                id,
                kind: kind_from_str(&kind),
                name,
                created_at,
            })
            .collect())
    }

    pub async fn list_members(&self, chat_id: &str) -> Result<Vec<Membership>, DbError> {
        let rows: Vec<(String, String, bool)> = sqlx::query_as(
            "SELECT user_id, role, blocked FROM chat_members WHERE chat_id = ?",
        )
        .bind(chat_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(user_id, role, blocked)| Membership {
                chat_id: chat_id.to_string(),
                user_id,
                role: role_from_str(&role),
                blocked,
            })
            .collect())
    }

    /// Sets the block flag on `user_id`'s own membership row: a user who has
    /// blocked a personal chat can no longer send into it, and the other
    /// party's sends resolve to `BlockedByRecipient` (spec.md §4.3
    /// `Block`/`Unblock`).
    pub async fn set_blocked(
        &self,
        chat_id: &str,
        user_id: &str,
        blocked: bool,
    ) -> Result<(), DbError> {
        sqlx::query("UPDATE chat_members SET blocked = ? WHERE chat_id = ? AND user_id = ?")
            .bind(blocked)
            .bind(chat_id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Same as [`Self::set_blocked`], executed inside the caller's open
    /// transaction (spec.md §4.3 `SendToChat`: the reply-clears-block flip
    /// must commit atomically with the message insert).
    pub async fn set_blocked_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        chat_id: &str,
        user_id: &str,
        blocked: bool,
    ) -> Result<(), DbError> {
        sqlx::query("UPDATE chat_members SET blocked = ? WHERE chat_id = ? AND user_id = ?")
            .bind(blocked)
            .bind(chat_id)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn personal_chat_is_found_regardless_of_argument_order() {
        let store = Store::connect("sqlite::memory:", 5).await.unwrap();
        let repo = store.chats();
        let chat = repo
            .create(NewChat {
                kind: ChatKind::Personal,
                name: None,
            })
            .await
            .unwrap();
        repo.add_member(&chat.id, "u1", Role::Member).await.unwrap();
        repo.add_member(&chat.id, "u2", Role::Member).await.unwrap();

        let found = repo.find_personal_chat("u2", "u1").await.unwrap();
        assert_eq!(found.unwrap().id, chat.id);
    }

    #[tokio::test]
    async fn list_for_user_returns_only_joined_chats() {
        let store = Store::connect("sqlite::memory:", 5).await.unwrap();
        let repo = store.chats();
        let chat_a = repo
            .create(NewChat {
                kind: ChatKind::Channel,
                name: Some("a"),
            })
            .await
            .unwrap();
        let chat_b = repo
            .create(NewChat {
                kind: ChatKind::Channel,
                name: Some("b"),
            })
            .await
            .unwrap();
        repo.add_member(&chat_a.id, "u1", Role::Admin).await.unwrap();
        repo.add_member(&chat_b.id, "u2", Role::Admin).await.unwrap();

        let chats = repo.list_for_user("u1").await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].id, chat_a.id);
    }

    #[tokio::test]
    async fn block_flag_round_trips() {
        let store = Store::connect("sqlite::memory:", 5).await.unwrap();
        let repo = store.chats();
        let chat = repo
            .create(NewChat {
                kind: ChatKind::Personal,
                name: None,
            })
            .await
            .unwrap();
        repo.add_member(&chat.id, "u1", Role::Member).await.unwrap();

        repo.set_blocked(&chat.id, "u1", true).await.unwrap();
        let membership = repo.get_membership(&chat.id, "u1").await.unwrap().unwrap();
        assert!(membership.blocked);
    }

    #[tokio::test]
    async fn duplicate_membership_is_rejected() {
        let store = Store::connect("sqlite::memory:", 5).await.unwrap();
        let repo = store.chats();
        let chat = repo
            .create(NewChat {
                kind: ChatKind::Channel,
                name: Some("general"),
            })
            .await
            .unwrap();
        repo.add_member(&chat.id, "u1", Role::Admin).await.unwrap();

        let err = repo.add_member(&chat.id, "u1", Role::Member).await.unwrap_err();
        assert!(matches!(err, DbError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn set_blocked_tx_commits_with_caller_transaction() {
        let store = Store::connect("sqlite::memory:", 5).await.unwrap();
        let repo = store.chats();
        let chat = repo
            .create(NewChat {
                kind: ChatKind::Personal,
                name: None,
            })
            .await
            .unwrap();
        repo.add_member(&chat.id, "u1", Role::Member).await.unwrap();

        let mut tx = store.pool().begin().await.unwrap();
        repo.set_blocked_tx(&mut tx, &chat.id, "u1", false).await.unwrap();
        tx.commit().await.unwrap();

        let membership = repo.get_membership(&chat.id, "u1").await.unwrap().unwrap();
        assert!(!membership.blocked);
    }
}
