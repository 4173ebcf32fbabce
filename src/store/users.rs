//! User accounts (spec.md §3 `User`, auth boundary concession in SPEC_FULL.md §3).

use chat_protocol::{PresenceStatus, User};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{DbError, is_unique_violation};

pub struct NewUser<'a> {
    pub name: &'a str,
    pub phone: &'a str,
    pub email: Option<&'a str>,
    pub password_hash: &'a str,
}

pub struct ProfileUpdate<'a> {
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub profile_picture: Option<&'a str>,
}

pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

fn status_to_str(status: PresenceStatus) -> &'static str {
    match status {
        PresenceStatus::Online => "online",
        PresenceStatus::Offline => "offline",
    }
}

fn status_from_str(s: &str) -> PresenceStatus {
    match s {
        "online" => PresenceStatus::Online,
        _ => PresenceStatus::Offline,
    }
}

type UserRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    String,
    DateTime<Utc>,
    Option<String>,
);

fn row_to_user_and_hash(row: UserRow) -> (User, String) {
    let (id, name, phone, email, password_hash, status, _created_at, last_seen, profile_picture) = row;
    (
        User {
            id,
            name,
            phone,
            email,
            status: status_from_str(&status),
            last_seen,
            profile_picture,
        },
        password_hash,
    )
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    const SELECT_COLUMNS: &'static str =
        "id, name, phone, email, password_hash, status, created_at, last_seen, profile_picture";

    pub async fn create(&self, new_user: NewUser<'_>) -> Result<User, DbError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, name, phone, email, password_hash, status, created_at, last_seen, profile_picture)
            VALUES (?, ?, ?, ?, ?, 'offline', ?, ?, NULL)
            "#,
        )
        .bind(&id)
        .bind(new_user.name)
        .bind(new_user.phone)
        .bind(new_user.email)
        .bind(new_user.password_hash)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::AlreadyExists(format!("phone {} already registered", new_user.phone))
            } else {
                DbError::Sqlx(e)
            }
        })?;

        Ok(User {
            id,
            name: new_user.name.to_string(),
            phone: new_user.phone.to_string(),
            email: new_user.email.map(str::to_string),
            status: PresenceStatus::Offline,
            last_seen: now,
            profile_picture: None,
        })
    }

    /// Returns the user and their password hash (the hash never leaves this
    /// module — callers verify it here, not at the API boundary).
    pub async fn find_by_phone_with_hash(&self, phone: &str) -> Result<Option<(User, String)>, DbError> {
        let query = format!("SELECT {} FROM users WHERE phone = ?", Self::SELECT_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&query).bind(phone).fetch_optional(self.pool).await?;
        Ok(row.map(row_to_user_and_hash))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, DbError> {
        let query = format!("SELECT {} FROM users WHERE id = ?", Self::SELECT_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&query).bind(id).fetch_optional(self.pool).await?;
        Ok(row.map(|r| row_to_user_and_hash(r).0))
    }

    /// Case-insensitive substring search over name and phone (spec.md §6.1
    /// `GET /api/users/search?q=`).
    pub async fn search(&self, query: &str, limit: i64) -> Result<Vec<User>, DbError> {
        let sql = format!(
            "SELECT {} FROM users WHERE name LIKE ? OR phone LIKE ? ORDER BY name LIMIT ?",
            Self::SELECT_COLUMNS
        );
        let pattern = format!("%{query}%");
        let rows: Vec<UserRow> = sqlx::query_as(&sql)
            .bind(&pattern)
            .bind(&pattern)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| row_to_user_and_hash(r).0).collect())
    }

    pub async fn update_profile(&self, id: &str, update: ProfileUpdate<'_>) -> Result<User, DbError> {
        sqlx::query(
            r#"
            UPDATE users SET
                name = COALESCE(?, name),
                email = COALESCE(?, email),
                profile_picture = COALESCE(?, profile_picture)
            WHERE id = ?
            "#,
        )
        .bind(update.name)
        .bind(update.email)
        .bind(update.profile_picture)
        .bind(id)
        .execute(self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("user {id}")))
    }

    /// Updates presence status and bumps `last_seen` to now (spec.md §6.1
    /// `PATCH /api/users/me/status`).
    pub async fn set_status(&self, id: &str, status: PresenceStatus) -> Result<(), DbError> {
        sqlx::query("UPDATE users SET status = ?, last_seen = ? WHERE id = ?")
            .bind(status_to_str(status))
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn create_and_find_round_trips() {
        let store = Store::connect("sqlite::memory:", 5).await.unwrap();
        let repo = store.users();
        let created = repo
            .create(NewUser {
                name: "Alice",
                phone: "+15550001111",
                email: None,
                password_hash: "hash",
            })
            .await
            .unwrap();

        let (found, hash) = repo.find_by_phone_with_hash("+15550001111").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(hash, "hash");
    }

    #[tokio::test]
    async fn duplicate_phone_is_rejected() {
        let store = Store::connect("sqlite::memory:", 5).await.unwrap();
        let repo = store.users();
        repo.create(NewUser {
            name: "Bob",
            phone: "+15550002222",
            email: None,
            password_hash: "hash1",
        })
        .await
        .unwrap();

        let err = repo
            .create(NewUser {
                name: "Bobby",
                phone: "+15550002222",
                email: None,
                password_hash: "hash2",
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn search_matches_name_or_phone_substring() {
        let store = Store::connect("sqlite::memory:", 5).await.unwrap();
        let repo = store.users();
        repo.create(NewUser {
            name: "Carol Danvers",
            phone: "+15550003333",
            email: None,
            password_hash: "hash",
        })
        .await
        .unwrap();

        let found = repo.search("Carol", 10).await.unwrap();
        assert_eq!(found.len(), 1);

        let found = repo.search("0003333", 10).await.unwrap();
        assert_eq!(found.len(), 1);

        let found = repo.search("nobody", 10).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn update_profile_only_touches_provided_fields() {
        let store = Store::connect("sqlite::memory:", 5).await.unwrap();
        let repo = store.users();
        let created = repo
            .create(NewUser {
                name: "Dana",
                phone: "+15550004444",
                email: None,
                password_hash: "hash",
            })
            .await
            .unwrap();

        let updated = repo
            .update_profile(
                &created.id,
                ProfileUpdate {
                    name: None,
                    email: Some("dana@example.com"),
                    profile_picture: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Dana");
        assert_eq!(updated.email.as_deref(), Some("dana@example.com"));
    }

    #[tokio::test]
    async fn set_status_updates_presence() {
        let store = Store::connect("sqlite::memory:", 5).await.unwrap();
        let repo = store.users();
        let created = repo
            .create(NewUser {
                name: "Eve",
                phone: "+15550005555",
                email: None,
                password_hash: "hash",
            })
            .await
            .unwrap();

        repo.set_status(&created.id, PresenceStatus::Online).await.unwrap();
        let found = repo.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(found.status, PresenceStatus::Online);
    }
}
