/// Member registry
///
/// Member records, their status and the opaque card token printed (as a QR
/// code) on the membership card.

pub(crate) mod manager;

pub use manager::MemberManager;

use crate::db::models::MemberStatus;
use crate::validation::{empty_as_none, validate_fiscal_code};
use serde::Deserialize;
use validator::Validate;

/// Admin form for a new member
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMember {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 50))]
    pub membership_number: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(custom(function = "validate_fiscal_code"))]
    pub fiscal_code: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(url)]
    pub photo_url: Option<String>,
    /// When set, a member login is created with this password
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(min = 8))]
    pub login_password: Option<String>,
}

/// Filters for the member list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberFilter {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub search: Option<String>,
}

impl MemberFilter {
    /// Unknown status values are ignored rather than rejected
    pub fn status(&self) -> Option<MemberStatus> {
        match self.status.as_deref() {
            Some("active") => Some(MemberStatus::Active),
            Some("inactive") => Some(MemberStatus::Inactive),
            _ => None,
        }
    }
}
