/// Event manager implementation
use crate::{
    db::{
        self,
        models::{parse_cents, Event, EventStatus, MemberStatus, User},
    },
    error::{AppError, AppResult},
    events::{available_spots, NewEvent, RegistrationError, RegistrationOutcome},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

const EVENT_COLUMNS: &str =
    "id, title, description, status, event_date, event_time, mode, location, cost_cents, capacity, created_at";

/// Registration joined with the member, for the admin event page
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RegistrationRow {
    pub id: i64,
    pub member_id: i64,
    pub member_name: String,
    pub membership_number: String,
    pub created_at: DateTime<Utc>,
}

/// Event manager service
pub struct EventManager {
    db: SqlitePool,
}

impl EventManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: &NewEvent) -> AppResult<Event> {
        let cost_cents = match new.cost.as_deref() {
            Some(cost) => parse_cents(cost).ok_or_else(|| AppError::Validation("Invalid cost".to_string()))?,
            None => 0,
        };
        let status = if new.publish.is_some() {
            EventStatus::Published
        } else {
            EventStatus::Draft
        };
        let now = Utc::now();

        let id = sqlx::query(
            "INSERT INTO events (title, description, status, event_date, event_time, mode, location, cost_cents, capacity, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(new.title.trim())
        .bind(new.description.trim())
        .bind(status)
        .bind(new.event_date)
        .bind(new.parsed_time())
        .bind(new.mode)
        .bind(&new.location)
        .bind(cost_cents)
        .bind(new.parsed_capacity())
        .bind(now)
        .execute(&self.db)
        .await?
        .last_insert_rowid();

        tracing::info!(event_id = id, ?status, "Created event");

        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> AppResult<Event> {
        self.find(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
    }

    pub async fn find(&self, id: i64) -> AppResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(event)
    }

    /// Published events in date order
    pub async fn list_published(&self) -> AppResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM events WHERE status = 'published' ORDER BY event_date, event_time, id",
            EVENT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(events)
    }

    /// Every event, newest first
    pub async fn list_all(&self) -> AppResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM events ORDER BY event_date DESC, id DESC",
            EVENT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(events)
    }

    pub async fn set_status(&self, id: i64, status: EventStatus) -> AppResult<()> {
        let result = sqlx::query("UPDATE events SET status = ?1 WHERE id = ?2")
            .bind(status)
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Event not found".to_string()));
        }

        tracing::info!(event_id = id, ?status, "Event status changed");
        Ok(())
    }

    pub async fn registration_count(&self, event_id: i64) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM event_registrations WHERE event_id = ?1")
            .bind(event_id)
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }

    /// Spots left, `None` for unlimited events
    pub async fn available_spots(&self, event: &Event) -> AppResult<Option<i64>> {
        let registered = self.registration_count(event.id).await?;
        Ok(available_spots(event.capacity, registered))
    }

    pub async fn is_registered(&self, event_id: i64, member_id: i64) -> AppResult<bool> {
        let registered: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM event_registrations WHERE event_id = ?1 AND member_id = ?2)",
        )
        .bind(event_id)
        .bind(member_id)
        .fetch_one(&self.db)
        .await?;

        Ok(registered)
    }

    /// Register the member linked to `user` for an event.
    ///
    /// Guards run in order: event exists, user is an active member, event is
    /// published. The unique (event, member) constraint decides duplicates.
    /// The write lock is taken up front so concurrent registrations queue on
    /// the busy timeout instead of failing the upgrade from a read.
    pub async fn register(&self, event_id: i64, user: &User) -> Result<RegistrationOutcome, RegistrationError> {
        let mut tx = self.db.begin_with("BEGIN IMMEDIATE").await?;

        let event = sqlx::query_as::<_, Event>(&format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS))
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RegistrationError::EventNotFound)?;

        let member_id = user.member_id.ok_or(RegistrationError::NotAMember)?;
        let status: Option<MemberStatus> = sqlx::query_scalar("SELECT status FROM members WHERE id = ?1")
            .bind(member_id)
            .fetch_optional(&mut *tx)
            .await?;
        if status != Some(MemberStatus::Active) {
            return Err(RegistrationError::NotAMember);
        }

        if !event.is_published() {
            return Err(RegistrationError::NotPublished);
        }

        let registered: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM event_registrations WHERE event_id = ?1")
            .bind(event_id)
            .fetch_one(&mut *tx)
            .await?;

        let inserted = sqlx::query(
            "INSERT INTO event_registrations (event_id, member_id, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(event_id)
        .bind(member_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if db::is_unique_violation(&e) => return Err(RegistrationError::AlreadyRegistered),
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;

        let outcome = match event.capacity {
            Some(capacity) if registered >= capacity => RegistrationOutcome::Waitlisted {
                position: registered - capacity + 1,
            },
            _ => RegistrationOutcome::Registered,
        };

        tracing::info!(event_id, member_id, outcome = outcome.as_str(), "Event registration");
        Ok(outcome)
    }

    /// Cancel a registration. Returns whether a row was removed; a missing
    /// registration is not an error.
    pub async fn unregister(&self, event_id: i64, member_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM event_registrations WHERE event_id = ?1 AND member_id = ?2")
            .bind(event_id)
            .bind(member_id)
            .execute(&self.db)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            tracing::info!(event_id, member_id, "Event registration cancelled");
        }
        Ok(removed)
    }

    /// 1-based waitlist position of a member, `None` when holding a regular
    /// spot or not registered. Order is registration order.
    pub async fn waitlist_position(&self, event: &Event, member_id: i64) -> AppResult<Option<i64>> {
        let Some(capacity) = event.capacity else {
            return Ok(None);
        };

        let rank: Option<i64> = sqlx::query_scalar(
            "SELECT (SELECT COUNT(*) FROM event_registrations o WHERE o.event_id = r.event_id AND o.id <= r.id)
             FROM event_registrations r
             WHERE r.event_id = ?1 AND r.member_id = ?2",
        )
        .bind(event.id)
        .bind(member_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(rank.filter(|r| *r > capacity).map(|r| r - capacity))
    }

    /// Registrations in registration order
    pub async fn registrations(&self, event_id: i64) -> AppResult<Vec<RegistrationRow>> {
        let rows = sqlx::query_as::<_, RegistrationRow>(
            "SELECT r.id, r.member_id, m.name AS member_name, m.membership_number, r.created_at
             FROM event_registrations r
             JOIN members m ON m.id = r.member_id
             WHERE r.event_id = ?1
             ORDER BY r.id",
        )
        .bind(event_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}
