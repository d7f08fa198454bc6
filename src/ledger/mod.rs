/// Association ledger: non-fee income and expenses

pub(crate) mod manager;

pub use manager::LedgerManager;

use crate::{
    db::models::LedgerKind,
    validation::{empty_as_none, validate_amount},
};
use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

/// Admin form for a ledger entry
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewLedgerEntry {
    pub kind: LedgerKind,
    pub entry_date: NaiveDate,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(custom(function = "validate_amount"))]
    pub amount: String,
}
