/// Fee manager implementation
use crate::{
    db::{
        self,
        models::{parse_cents, MembershipFeePayment, SocialYear},
    },
    error::{AppError, AppResult},
    fees::{NewPayment, NewSocialYear},
};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection, SqlitePool};

/// Payment joined with member and social year names, for reports
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentRow {
    pub id: i64,
    pub member_id: i64,
    pub member_name: String,
    pub membership_number: String,
    pub social_year_name: String,
    pub paid_date: NaiveDate,
    pub amount_cents: i64,
}

/// Fee manager service
pub struct FeeManager {
    db: SqlitePool,
}

impl FeeManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a social year, optionally making it the current one
    pub async fn create_social_year(&self, new: &NewSocialYear) -> AppResult<SocialYear> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            "INSERT INTO social_years (name, start_date, end_date, is_current) VALUES (?1, ?2, ?3, 0)",
        )
        .bind(new.name.trim())
        .bind(new.start_date)
        .bind(new.end_date)
        .execute(&mut *tx)
        .await;

        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(e) if db::is_unique_violation(&e) => {
                return Err(AppError::Conflict(format!("Social year {} already exists", new.name.trim())));
            }
            Err(e) => return Err(e.into()),
        };

        let make_current = new.make_current.is_some();
        if make_current {
            mark_current(&mut *tx, id).await?;
        }

        tx.commit().await?;
        if make_current {
            tracing::info!(social_year_id = id, "Current social year changed");
        }

        self.get_social_year(id).await
    }

    pub async fn get_social_year(&self, id: i64) -> AppResult<SocialYear> {
        sqlx::query_as::<_, SocialYear>(
            "SELECT id, name, start_date, end_date, is_current FROM social_years WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Social year not found".to_string()))
    }

    /// All social years, newest first
    pub async fn list_social_years(&self) -> AppResult<Vec<SocialYear>> {
        let years = sqlx::query_as::<_, SocialYear>(
            "SELECT id, name, start_date, end_date, is_current FROM social_years ORDER BY start_date DESC",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(years)
    }

    /// The current social year, if one is marked
    pub async fn current_social_year(&self) -> AppResult<Option<SocialYear>> {
        let year = sqlx::query_as::<_, SocialYear>(
            "SELECT id, name, start_date, end_date, is_current FROM social_years WHERE is_current = 1",
        )
        .fetch_optional(&self.db)
        .await?;

        Ok(year)
    }

    /// Mark `id` as the current social year.
    ///
    /// Clearing the previous flag and setting the new one happen in one
    /// transaction; the partial unique index rejects any interleaving that
    /// would leave two current years.
    pub async fn set_current(&self, id: i64) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        mark_current(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(social_year_id = id, "Current social year changed");
        Ok(())
    }

    /// Record a fee payment; one per member and social year
    pub async fn record_payment(&self, new: &NewPayment) -> AppResult<MembershipFeePayment> {
        let amount_cents = parse_cents(&new.amount)
            .ok_or_else(|| AppError::Validation("Invalid amount".to_string()))?;

        let result = sqlx::query(
            "INSERT INTO membership_fee_payments (member_id, social_year_id, paid_date, amount_cents)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(new.member_id)
        .bind(new.social_year_id)
        .bind(new.paid_date)
        .bind(amount_cents)
        .execute(&self.db)
        .await;

        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(e) if db::is_unique_violation(&e) => {
                return Err(AppError::Conflict(
                    "Fee already recorded for this member and social year".to_string(),
                ));
            }
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                return Err(AppError::NotFound("Member or social year not found".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(payment_id = id, member_id = new.member_id, "Recorded fee payment");

        Ok(MembershipFeePayment {
            id,
            member_id: new.member_id,
            social_year_id: new.social_year_id,
            paid_date: new.paid_date,
            amount_cents,
        })
    }

    /// Remove a payment, returns whether a row was deleted
    pub async fn delete_payment(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM membership_fee_payments WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether the member has a payment for the current social year
    pub async fn has_paid_current_year(&self, member_id: i64) -> AppResult<bool> {
        let paid: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM membership_fee_payments p
                 JOIN social_years y ON y.id = p.social_year_id
                 WHERE p.member_id = ?1 AND y.is_current = 1)",
        )
        .bind(member_id)
        .fetch_one(&self.db)
        .await?;

        Ok(paid)
    }

    /// Payments recorded for one social year
    pub async fn payments_for_social_year(&self, social_year_id: i64) -> AppResult<Vec<PaymentRow>> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            "SELECT p.id, p.member_id, m.name AS member_name, m.membership_number,
                    y.name AS social_year_name, p.paid_date, p.amount_cents
             FROM membership_fee_payments p
             JOIN members m ON m.id = p.member_id
             JOIN social_years y ON y.id = p.social_year_id
             WHERE p.social_year_id = ?1
             ORDER BY p.paid_date, p.id",
        )
        .bind(social_year_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Payments whose paid date falls in the calendar year
    pub async fn payments_in_calendar_year(&self, year: i32) -> AppResult<Vec<PaymentRow>> {
        let (from, to) = calendar_bounds(year)?;

        let rows = sqlx::query_as::<_, PaymentRow>(
            "SELECT p.id, p.member_id, m.name AS member_name, m.membership_number,
                    y.name AS social_year_name, p.paid_date, p.amount_cents
             FROM membership_fee_payments p
             JOIN members m ON m.id = p.member_id
             JOIN social_years y ON y.id = p.social_year_id
             WHERE p.paid_date >= ?1 AND p.paid_date < ?2
             ORDER BY p.paid_date, p.id",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}

/// `[Jan 1 of year, Jan 1 of year + 1)`
pub(crate) fn calendar_bounds(year: i32) -> AppResult<(NaiveDate, NaiveDate)> {
    let from = NaiveDate::from_ymd_opt(year, 1, 1);
    let to = year.checked_add(1).and_then(|next| NaiveDate::from_ymd_opt(next, 1, 1));

    match (from, to) {
        (Some(from), Some(to)) => Ok((from, to)),
        _ => Err(AppError::Validation(format!("Invalid year {}", year))),
    }
}

/// Move the current flag to `id` on an open transaction
async fn mark_current(conn: &mut SqliteConnection, id: i64) -> AppResult<()> {
    sqlx::query("UPDATE social_years SET is_current = 0 WHERE is_current = 1 AND id != ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    let result = sqlx::query("UPDATE social_years SET is_current = 1 WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Social year not found".to_string()));
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::members::{manager::tests::new_member, MemberManager};

    pub(crate) fn year_form(name: &str, year: i32, current: bool) -> NewSocialYear {
        NewSocialYear {
            name: name.to_string(),
            start_date: NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(year, 12, 31).unwrap(),
            make_current: current.then(|| "on".to_string()),
        }
    }

    pub(crate) fn payment_form(member_id: i64, social_year_id: i64, date: NaiveDate) -> NewPayment {
        NewPayment {
            member_id,
            social_year_id,
            paid_date: date,
            amount: "25.00".to_string(),
        }
    }

    #[tokio::test]
    async fn test_failed_current_switch_keeps_no_year() {
        let pool = db::test_pool().await;
        let fees = FeeManager::new(pool.clone());
        sqlx::query(
            "CREATE TRIGGER block_current BEFORE UPDATE OF is_current ON social_years
             WHEN NEW.is_current = 1
             BEGIN SELECT RAISE(ABORT, 'blocked'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        assert!(fees.create_social_year(&year_form("2030", 2030, true)).await.is_err());
        assert!(fees.list_social_years().await.unwrap().is_empty());

        // Without the flag the insert alone goes through
        fees.create_social_year(&year_form("2030", 2030, false)).await.unwrap();
    }

    #[tokio::test]
    async fn test_only_one_current_year() {
        let fees = FeeManager::new(db::test_pool().await);

        let y2024 = fees.create_social_year(&year_form("2024", 2024, true)).await.unwrap();
        assert!(y2024.is_current);

        let y2025 = fees.create_social_year(&year_form("2025", 2025, true)).await.unwrap();
        assert!(y2025.is_current);

        let current = fees.current_social_year().await.unwrap().unwrap();
        assert_eq!(current.id, y2025.id);
        assert!(!fees.get_social_year(y2024.id).await.unwrap().is_current);

        fees.set_current(y2024.id).await.unwrap();
        assert_eq!(fees.current_social_year().await.unwrap().unwrap().id, y2024.id);
    }

    #[tokio::test]
    async fn test_set_current_missing_year_keeps_previous() {
        let fees = FeeManager::new(db::test_pool().await);

        let year = fees.create_social_year(&year_form("2024", 2024, true)).await.unwrap();
        let result = fees.set_current(999).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(fees.current_social_year().await.unwrap().unwrap().id, year.id);
    }

    #[tokio::test]
    async fn test_has_paid_current_year() {
        let pool = db::test_pool().await;
        let fees = FeeManager::new(pool.clone());
        let members = MemberManager::new(pool);

        let anna = members.create(&new_member("Anna", "A-001")).await.unwrap();
        let past = fees.create_social_year(&year_form("2024", 2024, false)).await.unwrap();
        let current = fees.create_social_year(&year_form("2025", 2025, true)).await.unwrap();

        fees.record_payment(&payment_form(anna.id, past.id, past.start_date)).await.unwrap();
        assert!(!fees.has_paid_current_year(anna.id).await.unwrap());

        let payment = fees
            .record_payment(&payment_form(anna.id, current.id, current.start_date))
            .await
            .unwrap();
        assert_eq!(payment.amount_cents, 2500);
        assert!(fees.has_paid_current_year(anna.id).await.unwrap());

        assert!(fees.delete_payment(payment.id).await.unwrap());
        assert!(!fees.has_paid_current_year(anna.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_payment_conflict() {
        let pool = db::test_pool().await;
        let fees = FeeManager::new(pool.clone());
        let members = MemberManager::new(pool);

        let anna = members.create(&new_member("Anna", "A-001")).await.unwrap();
        let year = fees.create_social_year(&year_form("2025", 2025, true)).await.unwrap();

        fees.record_payment(&payment_form(anna.id, year.id, year.start_date)).await.unwrap();
        let result = fees.record_payment(&payment_form(anna.id, year.id, year.start_date)).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_payment_for_unknown_member() {
        let fees = FeeManager::new(db::test_pool().await);
        let year = fees.create_social_year(&year_form("2025", 2025, true)).await.unwrap();

        let result = fees.record_payment(&payment_form(77, year.id, year.start_date)).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_payments_in_calendar_year() {
        let pool = db::test_pool().await;
        let fees = FeeManager::new(pool.clone());
        let members = MemberManager::new(pool);

        let anna = members.create(&new_member("Anna", "A-001")).await.unwrap();
        let bruno = members.create(&new_member("Bruno", "A-002")).await.unwrap();
        let year = fees.create_social_year(&year_form("2025", 2025, true)).await.unwrap();

        fees.record_payment(&payment_form(anna.id, year.id, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()))
            .await
            .unwrap();
        fees.record_payment(&payment_form(bruno.id, year.id, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()))
            .await
            .unwrap();

        let rows = fees.payments_in_calendar_year(2025).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].member_name, "Bruno");
        assert_eq!(rows[0].social_year_name, "2025");
    }
}
