/// Unified error types for Tessera
use crate::views;
use axum::{
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

/// Main error type for the server
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization errors
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// CSRF token missing or mismatched
    #[error("Invalid CSRF token")]
    Csrf,

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (e.g., duplicate membership number)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Email delivery errors
    #[error("Mail error: {0}")]
    Mail(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Turn the error into a redirect carrying a notice for the user.
    ///
    /// Infrastructure failures are logged here and collapse to a generic
    /// connection error.
    pub fn at(self, location: impl Into<String>) -> UserMessage {
        let notice = match &self {
            AppError::Validation(_) => Notice::ValidationFailed,
            AppError::Csrf => Notice::InvalidCsrf,
            AppError::Authentication(_) => Notice::LoginRequired,
            AppError::Authorization(_) => Notice::NotAuthorized,
            AppError::NotFound(_) => Notice::NotFound,
            AppError::Conflict(_) => Notice::Duplicate,
            AppError::RateLimitExceeded { .. } => Notice::TooManyRequests,
            AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Mail(_)
            | AppError::Internal(_)
            | AppError::Io(_) => {
                tracing::error!("Request failed: {}", self);
                Notice::ConnectionError
            }
        };
        UserMessage::new(location, notice)
    }
}

/// Convert AppError to an HTML error page
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, title, message) = match &self {
            AppError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "Login required",
                "Please log in to continue.".to_string(),
            ),
            AppError::Authorization(_) => (
                StatusCode::FORBIDDEN,
                "Forbidden",
                "You are not allowed to access this page.".to_string(),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "Invalid request", msg.clone()),
            AppError::Csrf => (
                StatusCode::FORBIDDEN,
                "Invalid request",
                "The form has expired. Please reload the page and try again.".to_string(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", msg.clone()),
            AppError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests",
                "Please wait a moment and try again.".to_string(),
            ),
            AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Mail(_)
            | AppError::Internal(_)
            | AppError::Io(_) => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Connection error",
                    "Something went wrong. Please try again later.".to_string(), // Don't leak details
                )
            }
        };

        let mut response = (status, Html(views::layout::error_page(title, &message))).into_response();
        if let AppError::RateLimitExceeded { retry_after } = self {
            if let Ok(value) = retry_after.as_secs().max(1).to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type alias for Tessera operations
pub type AppResult<T> = Result<T, AppError>;

/// Severity of a notice, drives the banner colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl NoticeLevel {
    /// Bootstrap alert class
    pub fn css_class(&self) -> &'static str {
        match self {
            NoticeLevel::Success => "alert-success",
            NoticeLevel::Info => "alert-info",
            NoticeLevel::Warning => "alert-warning",
            NoticeLevel::Error => "alert-danger",
        }
    }
}

macro_rules! notices {
    ($($variant:ident => ($slug:literal, $level:ident, $text:literal),)+) => {
        /// One-shot message shown on the page a handler redirects to.
        ///
        /// Only the slug travels in the URL; the text is looked up when the
        /// target page renders, so nothing user-controlled is echoed back.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Notice {
            $($variant,)+
        }

        impl Notice {
            pub fn slug(&self) -> &'static str {
                match self {
                    $(Notice::$variant => $slug,)+
                }
            }

            pub fn from_slug(slug: &str) -> Option<Self> {
                match slug {
                    $($slug => Some(Notice::$variant),)+
                    _ => None,
                }
            }

            pub fn level(&self) -> NoticeLevel {
                match self {
                    $(Notice::$variant => NoticeLevel::$level,)+
                }
            }

            pub fn text(&self) -> &'static str {
                match self {
                    $(Notice::$variant => $text,)+
                }
            }
        }
    };
}

notices! {
    Registered => ("registered", Success, "You are registered for this event. A confirmation has been sent."),
    Waitlisted => ("waitlisted", Info, "The event is full: you have been added to the waiting list."),
    Unregistered => ("unregistered", Success, "Your registration has been cancelled."),
    NotRegistered => ("not_registered", Info, "You were not registered for this event."),
    UnregisterFailed => ("unregister_failed", Error, "Your registration could not be cancelled. Please try again."),
    AlreadyRegistered => ("already_registered", Warning, "You are already registered for this event."),
    EventNotFound => ("event_not_found", Warning, "The requested event does not exist."),
    EventNotPublished => ("event_not_published", Warning, "Registrations for this event are not open."),
    NotAMember => ("not_a_member", Warning, "Only association members can register for events."),
    InvalidRequest => ("invalid_request", Warning, "Invalid request."),
    InvalidCsrf => ("invalid_csrf", Error, "The form has expired. Please try again."),
    LoginRequired => ("login_required", Warning, "Please log in to continue."),
    LoginFailed => ("login_failed", Error, "Invalid email or password."),
    LoggedIn => ("logged_in", Success, "Welcome back."),
    LoggedOut => ("logged_out", Success, "You have been logged out."),
    ResetRequested => ("reset_requested", Info, "If the address belongs to an account, a password reset link has been sent."),
    ResetTokenInvalid => ("reset_token_invalid", Error, "This reset link is invalid or has expired."),
    PasswordMismatch => ("password_mismatch", Error, "The two passwords do not match."),
    PasswordTooShort => ("password_too_short", Error, "The password must be at least 8 characters long."),
    PasswordChanged => ("password_changed", Success, "Your password has been changed. Please log in."),
    NotAuthorized => ("not_authorized", Warning, "You are not allowed to do that."),
    NotFound => ("not_found", Warning, "The requested item does not exist."),
    Duplicate => ("duplicate", Warning, "An item with the same identifier already exists."),
    ValidationFailed => ("validation_failed", Error, "Some fields are missing or invalid."),
    TooManyRequests => ("too_many_requests", Error, "Too many attempts. Please wait a moment."),
    ConnectionError => ("connection_error", Error, "Connection error. Please try again later."),
    MemberSaved => ("member_saved", Success, "Member saved."),
    MemberStatusChanged => ("member_status_changed", Success, "Member status updated."),
    CardRotated => ("card_rotated", Success, "A new membership card token has been issued."),
    EventSaved => ("event_saved", Success, "Event saved."),
    EventPublished => ("event_published", Success, "Event published."),
    EventUnpublished => ("event_unpublished", Success, "Event moved back to draft."),
    SocialYearSaved => ("social_year_saved", Success, "Social year saved."),
    SocialYearActivated => ("social_year_activated", Success, "Current social year updated."),
    PaymentRecorded => ("payment_recorded", Success, "Payment recorded."),
    PaymentDeleted => ("payment_deleted", Success, "Payment removed."),
    LedgerEntrySaved => ("ledger_entry_saved", Success, "Entry saved."),
}

/// Redirect to `location` with a notice attached.
///
/// This is the error (and success) half of every form handler's
/// `Result<T, UserMessage>`; it renders as a 302 whose `notice` query
/// parameter is picked up by the target page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    pub location: String,
    pub notice: Notice,
}

impl UserMessage {
    pub fn new(location: impl Into<String>, notice: Notice) -> Self {
        Self {
            location: location.into(),
            notice,
        }
    }

    /// Final redirect target including the notice parameter
    pub fn target(&self) -> String {
        let separator = if self.location.contains('?') { '&' } else { '?' };
        format!("{}{}notice={}", self.location, separator, self.notice.slug())
    }
}

impl IntoResponse for UserMessage {
    fn into_response(self) -> Response {
        (StatusCode::FOUND, [(header::LOCATION, self.target())]).into_response()
    }
}
