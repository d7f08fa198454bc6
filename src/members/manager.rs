/// Member manager implementation
use crate::{
    account, crypto,
    db::{
        self,
        models::{Member, MemberStatus, Role},
    },
    error::{AppError, AppResult},
    members::{MemberFilter, NewMember},
};
use chrono::Utc;
use sqlx::SqlitePool;

const MEMBER_COLUMNS: &str = "id, name, email, membership_number, status, fiscal_code, photo_url, card_token, created_at";
const MEMBER_COLUMNS_QUALIFIED: &str = "m.id, m.name, m.email, m.membership_number, m.status, m.fiscal_code, m.photo_url, m.card_token, m.created_at";

/// Member manager service
pub struct MemberManager {
    db: SqlitePool,
}

impl MemberManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Register a new active member with a fresh card token.
    ///
    /// When `login_password` is set the member login is created in the same
    /// transaction; a rejected login leaves no member behind.
    pub async fn create(&self, new: &NewMember) -> AppResult<Member> {
        let mut tx = self.db.begin().await?;
        let card_token = crypto::generate_token();
        let now = Utc::now();
        let fiscal_code = new.fiscal_code.as_ref().map(|c| c.to_uppercase());

        let result = sqlx::query(
            "INSERT INTO members (name, email, membership_number, status, fiscal_code, photo_url, card_token, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(new.name.trim())
        .bind(new.email.trim())
        .bind(new.membership_number.trim())
        .bind(MemberStatus::Active)
        .bind(&fiscal_code)
        .bind(&new.photo_url)
        .bind(&card_token)
        .bind(now)
        .execute(&mut *tx)
        .await;

        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(e) if db::is_unique_violation(&e) => {
                return Err(AppError::Conflict(format!(
                    "Membership number {} already in use",
                    new.membership_number.trim()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(password) = &new.login_password {
            account::manager::insert_user(&mut *tx, &new.email, password, Role::Member, Some(id)).await?;
        }

        tx.commit().await?;
        tracing::info!(member_id = id, "Registered member");

        Ok(Member {
            id,
            name: new.name.trim().to_string(),
            email: new.email.trim().to_string(),
            membership_number: new.membership_number.trim().to_string(),
            status: MemberStatus::Active,
            fiscal_code,
            photo_url: new.photo_url.clone(),
            card_token,
            created_at: now,
        })
    }

    /// Get member by id
    pub async fn get(&self, id: i64) -> AppResult<Member> {
        sqlx::query_as::<_, Member>(&format!("SELECT {} FROM members WHERE id = ?1", MEMBER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Member not found".to_string()))
    }

    /// Get member by id, `None` if missing
    pub async fn find(&self, id: i64) -> AppResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>(&format!("SELECT {} FROM members WHERE id = ?1", MEMBER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(member)
    }

    /// List members ordered by name
    pub async fn list(&self, filter: &MemberFilter) -> AppResult<Vec<Member>> {
        let pattern = filter.search.as_ref().map(|s| format!("%{}%", s));

        let members = sqlx::query_as::<_, Member>(&format!(
            "SELECT {} FROM members
             WHERE (?1 IS NULL OR status = ?1)
               AND (?2 IS NULL OR name LIKE ?2 OR email LIKE ?2 OR membership_number LIKE ?2)
             ORDER BY name COLLATE NOCASE, id",
            MEMBER_COLUMNS
        ))
        .bind(filter.status())
        .bind(pattern)
        .fetch_all(&self.db)
        .await?;

        Ok(members)
    }

    /// Members eligible for the active-members export.
    ///
    /// With `paid_only` only members holding a payment for the current social
    /// year are returned.
    pub async fn list_active(&self, paid_only: bool) -> AppResult<Vec<Member>> {
        let members = sqlx::query_as::<_, Member>(&format!(
            "SELECT {} FROM members m
             WHERE m.status = 'active'
               AND (?1 = 0 OR EXISTS (
                   SELECT 1 FROM membership_fee_payments p
                   JOIN social_years y ON y.id = p.social_year_id
                   WHERE p.member_id = m.id AND y.is_current = 1))
             ORDER BY m.name COLLATE NOCASE, m.id",
            MEMBER_COLUMNS_QUALIFIED
        ))
        .bind(paid_only)
        .fetch_all(&self.db)
        .await?;

        Ok(members)
    }

    /// Change membership status
    pub async fn set_status(&self, id: i64, status: MemberStatus) -> AppResult<()> {
        let result = sqlx::query("UPDATE members SET status = ?1 WHERE id = ?2")
            .bind(status)
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Member not found".to_string()));
        }

        tracing::info!(member_id = id, %status, "Member status changed");
        Ok(())
    }

    /// Issue a new card token; the old QR code stops resolving
    pub async fn rotate_card_token(&self, id: i64) -> AppResult<String> {
        let token = crypto::generate_token();

        let result = sqlx::query("UPDATE members SET card_token = ?1 WHERE id = ?2")
            .bind(&token)
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Member not found".to_string()));
        }

        tracing::info!(member_id = id, "Card token rotated");
        Ok(token)
    }
}
