//! 24h-expiring stories (spec.md §3 `Story`, §4.3 `CreateStory`/cleanup cron).

use chat_protocol::Story;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::DbError;

/// Lifetime of a story before it is eligible for cleanup (spec.md §3).
pub const STORY_TTL: ChronoDuration = ChronoDuration::hours(24);

pub struct StoryRepository<'a> {
    pool: &'a SqlitePool,
}

type StoryRow = (String, String, String, DateTime<Utc>, DateTime<Utc>);

fn row_to_story(row: StoryRow) -> Story {
    let (id, user_id, media_url, created_at, expires_at) = row;
    Story {
        id,
        user_id,
        media_url,
        created_at,
        expires_at,
    }
}

impl<'a> StoryRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: &str, media_url: &str) -> Result<Story, DbError> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let expires_at = created_at + STORY_TTL;

        sqlx::query(
            "INSERT INTO stories (id, user_id, media_url, created_at, expires_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(media_url)
        .bind(created_at)
        .bind(expires_at)
        .execute(self.pool)
        .await?;

        Ok(Story {
            id,
            user_id: user_id.to_string(),
            media_url: media_url.to_string(),
            created_at,
            expires_at,
        })
    }

    /// Unexpired stories, newest first (spec.md §4.3 `ListActiveStories`).
    pub async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<Story>, DbError> {
        let rows: Vec<StoryRow> = sqlx::query_as(
            "SELECT id, user_id, media_url, created_at, expires_at FROM stories WHERE expires_at > ? ORDER BY created_at DESC",
        )
        .bind(now)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_story).collect())
    }

    /// Deletes expired stories, returning how many were removed. Run hourly
    /// by the background cleanup task (spec.md §4.5).
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM stories WHERE expires_at <= ?")
            .bind(now)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn active_stories_exclude_expired_ones() {
        let store = Store::connect("sqlite::memory:", 5).await.unwrap();
        let repo = store.stories();
        let story = repo.create("u1", "http://media/1").await.unwrap();

        let active = repo.list_active(Utc::now()).await.unwrap();
        assert_eq!(active.len(), 1);

        let past_expiry = story.expires_at + ChronoDuration::seconds(1);
        let active = repo.list_active(past_expiry).await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn delete_expired_removes_only_expired_rows() {
        let store = Store::connect("sqlite::memory:", 5).await.unwrap();
        let repo = store.stories();
        let story = repo.create("u1", "http://media/1").await.unwrap();

        let removed = repo.delete_expired(Utc::now()).await.unwrap();
        assert_eq!(removed, 0);

        let past_expiry = story.expires_at + ChronoDuration::seconds(1);
        let removed = repo.delete_expired(past_expiry).await.unwrap();
        assert_eq!(removed, 1);
    }
}
