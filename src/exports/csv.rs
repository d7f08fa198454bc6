/// Active-member CSV export
use crate::{
    db::models::Member,
    error::{AppError, AppResult},
};
use chrono::NaiveDate;

/// Selectable CSV column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportField {
    MembershipNumber,
    Name,
    Email,
    Status,
    FiscalCode,
    JoinedAt,
}

impl ExportField {
    pub const ALL: [ExportField; 6] = [
        ExportField::MembershipNumber,
        ExportField::Name,
        ExportField::Email,
        ExportField::Status,
        ExportField::FiscalCode,
        ExportField::JoinedAt,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ExportField::MembershipNumber => "membership_number",
            ExportField::Name => "name",
            ExportField::Email => "email",
            ExportField::Status => "status",
            ExportField::FiscalCode => "fiscal_code",
            ExportField::JoinedAt => "joined_at",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    fn value(&self, member: &Member) -> String {
        match self {
            ExportField::MembershipNumber => member.membership_number.clone(),
            ExportField::Name => member.name.clone(),
            ExportField::Email => member.email.clone(),
            ExportField::Status => member.status.to_string(),
            ExportField::FiscalCode => member.fiscal_code.clone().unwrap_or_default(),
            ExportField::JoinedAt => member.created_at.date_naive().to_string(),
        }
    }

    /// Parse a comma-separated field list, keeping the requested order.
    ///
    /// An absent or blank list selects every field; repeated keys are
    /// dropped; unknown keys are rejected.
    pub fn parse_list(list: Option<&str>) -> AppResult<Vec<ExportField>> {
        let Some(list) = list.filter(|l| !l.trim().is_empty()) else {
            return Ok(Self::ALL.to_vec());
        };

        let mut fields = Vec::new();
        for key in list.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            let field = Self::from_key(key)
                .ok_or_else(|| AppError::Validation(format!("Unknown export field: {}", key)))?;
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        Ok(fields)
    }
}

/// Render members as CSV with a header row of field keys
pub fn active_members_csv(members: &[Member], fields: &[ExportField]) -> AppResult<Vec<u8>> {
    let mut writer = ::csv::Writer::from_writer(Vec::new());

    writer
        .write_record(fields.iter().map(|f| f.key()))
        .map_err(|e| AppError::Internal(format!("CSV write failed: {}", e)))?;

    for member in members {
        writer
            .write_record(fields.iter().map(|f| f.value(member)))
            .map_err(|e| AppError::Internal(format!("CSV write failed: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV flush failed: {}", e)))
}

pub fn csv_filename(date: NaiveDate) -> String {
    format!("active_members_{}.csv", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::MemberStatus;
    use chrono::{TimeZone, Utc};

    fn member(name: &str, fiscal_code: Option<&str>) -> Member {
        Member {
            id: 1,
            name: name.to_string(),
            email: "anna@example.com".to_string(),
            membership_number: "A-001".to_string(),
            status: MemberStatus::Active,
            fiscal_code: fiscal_code.map(str::to_string),
            photo_url: None,
            card_token: "x".repeat(64),
            created_at: Utc.with_ymd_and_hms(2024, 9, 1, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_parse_field_list() {
        assert_eq!(ExportField::parse_list(None).unwrap(), ExportField::ALL.to_vec());
        assert_eq!(ExportField::parse_list(Some("  ")).unwrap(), ExportField::ALL.to_vec());
        assert_eq!(
            ExportField::parse_list(Some("email, name,email")).unwrap(),
            vec![ExportField::Email, ExportField::Name]
        );
        assert!(matches!(
            ExportField::parse_list(Some("name,card_token")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_header_follows_requested_order() {
        let fields = vec![ExportField::Email, ExportField::Name, ExportField::JoinedAt];
        let bytes = active_members_csv(&[member("Anna", None)], &fields).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("email,name,joined_at"));
        assert_eq!(lines.next(), Some("anna@example.com,Anna,2024-09-01"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_values_are_quoted_when_needed() {
        let bytes = active_members_csv(&[member("Rossi, Anna", Some("RSSNNA80A41H501X"))], &[
            ExportField::Name,
            ExportField::FiscalCode,
        ])
        .unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains("\"Rossi, Anna\",RSSNNA80A41H501X"));
    }

    #[test]
    fn test_filename() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(csv_filename(date), "active_members_2025-03-07.csv");
    }
}
