/// Ledger manager implementation
use crate::{
    db::models::{parse_cents, LedgerEntry},
    error::{AppError, AppResult},
    fees::manager::calendar_bounds,
    ledger::NewLedgerEntry,
};
use chrono::Utc;
use sqlx::SqlitePool;

/// Ledger manager service
pub struct LedgerManager {
    db: SqlitePool,
}

impl LedgerManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn add(&self, new: &NewLedgerEntry) -> AppResult<LedgerEntry> {
        let amount_cents = parse_cents(&new.amount)
            .ok_or_else(|| AppError::Validation("Invalid amount".to_string()))?;
        let now = Utc::now();

        let id = sqlx::query(
            "INSERT INTO ledger_entries (kind, entry_date, description, category, amount_cents, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(new.kind)
        .bind(new.entry_date)
        .bind(new.description.trim())
        .bind(&new.category)
        .bind(amount_cents)
        .bind(now)
        .execute(&self.db)
        .await?
        .last_insert_rowid();

        tracing::info!(entry_id = id, kind = ?new.kind, "Ledger entry added");

        Ok(LedgerEntry {
            id,
            kind: new.kind,
            entry_date: new.entry_date,
            description: new.description.trim().to_string(),
            category: new.category.clone(),
            amount_cents,
            created_at: now,
        })
    }

    /// Entries dated within the calendar year, in date order
    pub async fn list_for_year(&self, year: i32) -> AppResult<Vec<LedgerEntry>> {
        let (from, to) = calendar_bounds(year)?;

        let entries = sqlx::query_as::<_, LedgerEntry>(
            "SELECT id, kind, entry_date, description, category, amount_cents, created_at
             FROM ledger_entries
             WHERE entry_date >= ?1 AND entry_date < ?2
             ORDER BY entry_date, id",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }
}
