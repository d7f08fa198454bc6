/// Account manager: login identities and password reset tokens
use crate::{
    config::BootstrapAdmin,
    crypto::{self, password},
    db::{
        self,
        models::{PasswordResetToken, Role, User},
    },
    error::{AppError, AppResult},
};
use chrono::{DateTime, Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};

/// Reset tokens live for one hour
pub const RESET_TOKEN_TTL_MINUTES: i64 = 60;

/// Freshly issued reset token. The plain token only exists here; the
/// database keeps its hash.
#[derive(Debug, Clone)]
pub struct IssuedResetToken {
    pub token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a login
    pub async fn create_user(
        &self,
        email: &str,
        plain_password: &str,
        role: Role,
        member_id: Option<i64>,
    ) -> AppResult<User> {
        let mut conn = self.db.acquire().await?;
        insert_user(&mut conn, email, plain_password, role, member_id).await
    }

    /// Find user by (case-insensitive) email
    pub async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, role, member_id, created_at FROM users WHERE email = ?1",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    /// Check credentials. Unknown email and wrong password fail the same way.
    pub async fn authenticate(&self, email: &str, plain_password: &str) -> AppResult<User> {
        let user = self
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid credentials".to_string()))?;

        if !password::verify_password(plain_password, &user.password_hash)? {
            return Err(AppError::Authentication("Invalid credentials".to_string()));
        }

        Ok(user)
    }

    /// Create the configured administrator if no user exists yet
    pub async fn ensure_bootstrap_admin(&self, admin: &BootstrapAdmin) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;

        if count > 0 {
            return Ok(false);
        }

        self.create_user(&admin.email, &admin.password, Role::Admin, None)
            .await?;
        tracing::info!("Bootstrap administrator created");
        Ok(true)
    }

    /// Issue a password reset token for the account behind `email`.
    ///
    /// Returns `None` when no account matches; callers must answer the same
    /// way in both cases. Earlier unused tokens of the same user are
    /// invalidated.
    pub async fn request_password_reset(&self, email: &str) -> AppResult<Option<IssuedResetToken>> {
        let Some(user) = self.find_user_by_email(email).await? else {
            tracing::debug!("Password reset requested for unknown address");
            return Ok(None);
        };

        let token = crypto::generate_token();
        let now = Utc::now();
        let expires_at = now + Duration::minutes(RESET_TOKEN_TTL_MINUTES);

        let mut tx = self.db.begin().await?;

        sqlx::query("UPDATE password_reset_tokens SET used = 1 WHERE user_id = ?1 AND used = 0")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO password_reset_tokens (user_id, token_hash, expires_at, used, created_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
        )
        .bind(user.id)
        .bind(crypto::hash_token(&token))
        .bind(expires_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(user_id = user.id, "Issued password reset token");

        Ok(Some(IssuedResetToken {
            token,
            user,
            expires_at,
        }))
    }

    /// True while the token is unused and not expired
    pub async fn is_reset_token_valid(&self, token: &str) -> AppResult<bool> {
        if !crypto::is_token_shaped(token) {
            return Ok(false);
        }

        let record = self.find_reset_token(token).await?;
        Ok(record.is_some_and(|r| r.is_usable(Utc::now())))
    }

    /// Look up a reset token row by the plain token
    pub async fn find_reset_token(&self, token: &str) -> AppResult<Option<PasswordResetToken>> {
        let record = sqlx::query_as::<_, PasswordResetToken>(
            "SELECT id, user_id, token_hash, expires_at, used, created_at
             FROM password_reset_tokens WHERE token_hash = ?1",
        )
        .bind(crypto::hash_token(token))
        .fetch_optional(&self.db)
        .await?;

        Ok(record)
    }

    /// Redeem a reset token and set a new password.
    ///
    /// Consumption is a single guarded UPDATE, so two concurrent redemptions
    /// of the same token cannot both succeed. All sessions of the user are
    /// dropped. Returns the user id.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<i64> {
        password::validate_password_strength(new_password)?;

        if !crypto::is_token_shaped(token) {
            return Err(AppError::Validation("Invalid or expired reset token".to_string()));
        }

        let password_hash = password::hash_password(new_password)?;

        let mut tx = self.db.begin().await?;

        let user_id: Option<i64> = sqlx::query_scalar(
            "UPDATE password_reset_tokens SET used = 1
             WHERE token_hash = ?1 AND used = 0 AND expires_at > ?2
             RETURNING user_id",
        )
        .bind(crypto::hash_token(token))
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(user_id) = user_id else {
            return Err(AppError::Validation("Invalid or expired reset token".to_string()));
        };

        sqlx::query("UPDATE users SET password_hash = ?1 WHERE id = ?2")
            .bind(&password_hash)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id, "Password reset successful");

        Ok(user_id)
    }

    /// Remove used and expired reset tokens
    pub async fn cleanup_reset_tokens(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE used = 1 OR expires_at < ?1")
            .bind(Utc::now())
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Insert a login on an open connection, so callers can make it part of a
/// larger transaction
pub(crate) async fn insert_user(
    conn: &mut SqliteConnection,
    email: &str,
    plain_password: &str,
    role: Role,
    member_id: Option<i64>,
) -> AppResult<User> {
    let email = normalize_email(email);
    if !email.contains('@') {
        return Err(AppError::Validation("Invalid email format".to_string()));
    }
    password::validate_password_strength(plain_password)?;

    let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?1")
        .bind(&email)
        .fetch_optional(&mut *conn)
        .await?;
    if taken.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = password::hash_password(plain_password)?;
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO users (email, password_hash, role, member_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&email)
    .bind(&password_hash)
    .bind(role)
    .bind(member_id)
    .bind(now)
    .execute(&mut *conn)
    .await;

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if db::is_unique_violation(&e) => {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = id, ?role, "Created user");

    Ok(User {
        id,
        email,
        password_hash,
        role,
        member_id,
        created_at: now,
    })
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
