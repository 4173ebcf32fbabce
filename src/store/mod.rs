//! Persistent storage (spec.md §4.1, §6.5): one SQLite-backed repository per
//! entity, composed behind a single `Store` handle.

mod chats;
mod messages;
mod stories;
mod users;

pub use chats::{ChatRepository, NewChat};
pub use messages::MessageRepository;
pub use stories::StoryRepository;
pub use users::{NewUser, ProfileUpdate, UserRepository};

use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;
use tracing::info;

/// Storage errors (spec.md §7's `NotFound`/`Conflict`/`StoreUnavailable` map
/// onto these at the API boundary via `From<DbError> for ApiError`).
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
}

/// Storage handle: a connection pool plus one repository accessor per
/// entity (spec.md §3's `User`/`Chat`/`Membership`/`Message`/`Story`).
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connects to `url` (a `sqlite://` path or `sqlite::memory:`) and applies
    /// the embedded migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, DbError> {
        let options: SqliteConnectOptions = url
            .parse::<SqliteConnectOptions>()?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Self::ACQUIRE_TIMEOUT)
            .idle_timeout(Some(Self::IDLE_TIMEOUT))
            .test_before_acquire(true)
            .connect_with(options)
            .await?;

        info!(url, "store connected");

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("store migrations applied");

        Ok(Self { pool })
    }

    /// The underlying pool, for transactional work that spans repositories
    /// (the Dispatcher's send path needs `begin()` directly).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn users(&self) -> UserRepository<'_> {
        UserRepository::new(&self.pool)
    }

    pub fn chats(&self) -> ChatRepository<'_> {
        ChatRepository::new(&self.pool)
    }

    pub fn messages(&self) -> MessageRepository<'_> {
        MessageRepository::new(&self.pool)
    }

    pub fn stories(&self) -> StoryRepository<'_> {
        StoryRepository::new(&self.pool)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connects_and_migrates_in_memory() {
        let store = Store::connect("sqlite::memory:", 5).await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }

    /// Exercises `create_if_missing` against a real on-disk database file,
    /// not just `sqlite::memory:`, the way a deployed node actually connects.
    #[tokio::test]
    async fn connects_and_migrates_a_fresh_file_backed_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatcore.db");
        let url = format!("sqlite://{}", path.display());

        let store = Store::connect(&url, 5).await.unwrap();
        assert!(path.exists());

        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chats")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }
}
