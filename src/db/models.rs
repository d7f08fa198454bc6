/// Row records for every table in the schema
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Membership status; only `Active` members hold a valid card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Inactive,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Member record in the database
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub membership_number: String,
    pub status: MemberStatus,
    pub fiscal_code: Option<String>,
    pub photo_url: Option<String>,
    #[serde(skip_serializing)]
    pub card_token: String,
    pub created_at: DateTime<Utc>,
}

impl Member {
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }
}

/// Login role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

/// Login identity, optionally linked to a member record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub member_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Server-side session row; `user_id` is empty for anonymous visitors
#[derive(Debug, Clone, FromRow)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: Option<i64>,
    pub csrf_token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Password reset token; only the SHA-256 of the token is stored
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    /// Unused and not yet expired at `now`
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.used && self.expires_at > now
    }
}

/// Fee period
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SocialYear {
    pub id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_current: bool,
}

/// Membership fee payment
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MembershipFeePayment {
    pub id: i64,
    pub member_id: i64,
    pub social_year_id: i64,
    pub paid_date: NaiveDate,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Published,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventMode {
    InPerson,
    Online,
    Hybrid,
}

impl EventMode {
    pub fn label(&self) -> &'static str {
        match self {
            EventMode::InPerson => "In person",
            EventMode::Online => "Online",
            EventMode::Hybrid => "Hybrid",
        }
    }
}

/// Event record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: EventStatus,
    pub event_date: NaiveDate,
    pub event_time: Option<NaiveTime>,
    pub mode: EventMode,
    pub location: Option<String>,
    pub cost_cents: i64,
    /// `None` means unlimited
    pub capacity: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn is_published(&self) -> bool {
        self.status == EventStatus::Published
    }
}

/// Registration of a member to an event
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EventRegistration {
    pub id: i64,
    pub event_id: i64,
    pub member_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    Income,
    Expense,
}

/// Non-fee income or expense
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub kind: LedgerKind,
    pub entry_date: NaiveDate,
    pub description: String,
    pub category: Option<String>,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Format integer cents as a decimal amount ("12.50")
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a decimal amount ("12", "12.5", "12,50") into cents
pub fn parse_cents(input: &str) -> Option<i64> {
    let normalized = input.trim().replace(',', ".");
    if normalized.is_empty() || normalized.starts_with('-') {
        return None;
    }

    let (whole, frac) = match normalized.split_once('.') {
        Some((w, f)) => (w, f),
        None => (normalized.as_str(), ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return None;
    }

    if frac.len() > 2 || !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.parse().ok()?,
    };

    whole.checked_mul(100)?.checked_add(frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(1250), "12.50");
        assert_eq!(format_cents(-305), "-3.05");
    }

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_cents("12"), Some(1200));
        assert_eq!(parse_cents("12.5"), Some(1250));
        assert_eq!(parse_cents("12,05"), Some(1205));
        assert_eq!(parse_cents(" 0.99 "), Some(99));
        assert_eq!(parse_cents("1.234"), None);
        assert_eq!(parse_cents("-4"), None);
        assert_eq!(parse_cents("abc"), None);
        assert_eq!(parse_cents(""), None);
    }
}
