/// Account management system
///
/// Handles login identities, server-side sessions (each carrying its CSRF
/// token) and the password reset token lifecycle.

pub(crate) mod manager;
mod sessions;

pub use manager::{AccountManager, IssuedResetToken};
pub use sessions::SessionStore;

use crate::db::models::User;

/// Session resolved from the request cookie
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub id: String,
    pub csrf_token: String,
    pub user: Option<User>,
}
