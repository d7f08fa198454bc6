/// Events and member registrations
///
/// Registration goes through [`EventManager::register`], which runs every
/// guard and the insert in one transaction. Capacity never blocks a
/// registration: once the event is full new registrations are reported as
/// waitlisted, and their waitlist position is derived from registration
/// order.

pub(crate) mod manager;

pub use manager::{EventManager, RegistrationRow};

use crate::{
    db::models::EventMode,
    error::{Notice, UserMessage},
    validation::{empty_as_none, validate_amount},
};
use chrono::NaiveTime;
use serde::Deserialize;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Result of a successful registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// A spot was available
    Registered,
    /// The event was already full; `position` is 1-based
    Waitlisted { position: i64 },
}

impl RegistrationOutcome {
    pub fn notice(&self) -> Notice {
        match self {
            RegistrationOutcome::Registered => Notice::Registered,
            RegistrationOutcome::Waitlisted { .. } => Notice::Waitlisted,
        }
    }

    /// Label used for metrics and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationOutcome::Registered => "registered",
            RegistrationOutcome::Waitlisted { .. } => "waitlisted",
        }
    }
}

/// Guard failures of the registration workflow
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Event not found")]
    EventNotFound,

    #[error("User is not linked to an active member")]
    NotAMember,

    #[error("Event is not published")]
    NotPublished,

    #[error("Member already registered")]
    AlreadyRegistered,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl RegistrationError {
    pub fn notice(&self) -> Notice {
        match self {
            RegistrationError::EventNotFound => Notice::EventNotFound,
            RegistrationError::NotAMember => Notice::NotAMember,
            RegistrationError::NotPublished => Notice::EventNotPublished,
            RegistrationError::AlreadyRegistered => Notice::AlreadyRegistered,
            RegistrationError::Database(_) => Notice::ConnectionError,
        }
    }

    /// Label used for metrics and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationError::EventNotFound => "event_not_found",
            RegistrationError::NotAMember => "not_a_member",
            RegistrationError::NotPublished => "not_published",
            RegistrationError::AlreadyRegistered => "already_registered",
            RegistrationError::Database(_) => "error",
        }
    }

    /// Redirect target with the matching notice
    pub fn at(self, location: impl Into<String>) -> UserMessage {
        if let RegistrationError::Database(e) = &self {
            tracing::error!("Registration failed: {}", e);
        }
        UserMessage::new(location, self.notice())
    }
}

/// Spots left given a capacity and the number of registrations.
///
/// `None` means unlimited. Saturates at zero when registrations exceed the
/// capacity (the waitlist).
pub fn available_spots(capacity: Option<i64>, registered: i64) -> Option<i64> {
    capacity.map(|c| (c - registered).max(0))
}

/// Admin form for an event
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewEvent {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub event_date: chrono::NaiveDate,
    /// `HH:MM` as sent by a time input
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(custom(function = "validate_time"))]
    pub event_time: Option<String>,
    pub mode: EventMode,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(custom(function = "validate_amount"))]
    pub cost: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(custom(function = "validate_capacity"))]
    pub capacity: Option<String>,
    /// Checkbox; publish immediately when ticked
    pub publish: Option<String>,
}

impl NewEvent {
    pub fn parsed_time(&self) -> Option<NaiveTime> {
        self.event_time.as_deref().and_then(parse_time)
    }

    pub fn parsed_capacity(&self) -> Option<i64> {
        self.capacity.as_deref().and_then(|c| c.trim().parse().ok())
    }
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

fn validate_time(value: &str) -> Result<(), ValidationError> {
    match parse_time(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("time")),
    }
}

fn validate_capacity(value: &str) -> Result<(), ValidationError> {
    match value.trim().parse::<i64>() {
        Ok(c) if c >= 0 => Ok(()),
        _ => Err(ValidationError::new("capacity")),
    }
}
