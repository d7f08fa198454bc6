/// Social years and membership fee payments

pub(crate) mod manager;

pub use manager::{FeeManager, PaymentRow};

use crate::validation::validate_amount;
use chrono::NaiveDate;
use serde::Deserialize;
use validator::{Validate, ValidationError};

/// Admin form for a social year
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_year_range"))]
pub struct NewSocialYear {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Checkbox; present when ticked
    pub make_current: Option<String>,
}

fn validate_year_range(year: &NewSocialYear) -> Result<(), ValidationError> {
    if year.end_date < year.start_date {
        return Err(ValidationError::new("end_before_start"));
    }
    Ok(())
}

/// Admin form for a fee payment
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPayment {
    pub member_id: i64,
    pub social_year_id: i64,
    pub paid_date: NaiveDate,
    #[validate(custom(function = "validate_amount"))]
    pub amount: String,
}
