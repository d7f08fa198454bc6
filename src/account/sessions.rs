/// Server-side session store
use crate::{
    account::ActiveSession,
    crypto,
    db::models::{SessionRecord, User},
    error::AppResult,
};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;

/// Session store backed by the `sessions` table
pub struct SessionStore {
    db: SqlitePool,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(db: SqlitePool, ttl_hours: i64) -> Self {
        Self {
            db,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Start a new session, anonymous when `user_id` is `None`
    pub async fn start(&self, user_id: Option<i64>) -> AppResult<ActiveSession> {
        let id = crypto::generate_token();
        let csrf_token = crypto::generate_token();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO sessions (id, user_id, csrf_token, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(&csrf_token)
        .bind(now)
        .bind(now + self.ttl)
        .execute(&self.db)
        .await?;

        let user = match user_id {
            Some(uid) => self.user(uid).await?,
            None => None,
        };

        Ok(ActiveSession {
            id,
            csrf_token,
            user,
        })
    }

    /// Resolve a session id from a cookie. Expired or unknown ids yield `None`.
    pub async fn load(&self, id: &str) -> AppResult<Option<ActiveSession>> {
        if !crypto::is_token_shaped(id) {
            return Ok(None);
        }

        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, user_id, csrf_token, created_at, expires_at FROM sessions WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        let Some(record) = record else {
            return Ok(None);
        };

        if Utc::now() > record.expires_at {
            self.destroy(&record.id).await?;
            return Ok(None);
        }

        let user = match record.user_id {
            Some(uid) => self.user(uid).await?,
            None => None,
        };

        Ok(Some(ActiveSession {
            id: record.id,
            csrf_token: record.csrf_token,
            user,
        }))
    }

    /// Replace the current session with a fresh one for `user_id`.
    ///
    /// Called on login so a session id (and its CSRF token) seen before
    /// authentication is never reused after it.
    pub async fn rotate(&self, previous: Option<&str>, user_id: i64) -> AppResult<ActiveSession> {
        if let Some(previous) = previous {
            self.destroy(previous).await?;
        }
        self.start(Some(user_id)).await
    }

    /// Delete a session (logout)
    pub async fn destroy(&self, id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Remove expired sessions, returns the number deleted
    pub async fn cleanup_expired(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?1")
            .bind(Utc::now())
            .execute(&self.db)
            .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            tracing::info!(sessions_deleted = deleted, "Cleaned up expired sessions");
        } else {
            tracing::debug!("Session cleanup: no expired sessions found");
        }

        Ok(deleted)
    }

    async fn user(&self, user_id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, role, member_id, created_at FROM users WHERE id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }
}
