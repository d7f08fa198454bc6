/// Form validation helpers
///
/// Field rules live on the form structs as `validator` derives; this module
/// holds the custom rules and the glue that turns `ValidationErrors` into
/// an `AppError`.
use crate::error::AppError;
use serde::{Deserialize, Deserializer};
use validator::{Validate, ValidationError, ValidationErrors};

/// Run derive validation and map failures to `AppError::Validation`
pub fn validate_form<T: Validate>(form: &T) -> Result<(), AppError> {
    form.validate().map_err(|e| AppError::Validation(describe(&e)))
}

/// Flatten validator errors into "field: code" pairs
fn describe(errors: &ValidationErrors) -> String {
    let mut fields: Vec<String> = errors
        .field_errors()
        .iter()
        .map(|(field, errs)| {
            let codes: Vec<&str> = errs.iter().map(|e| e.code.as_ref()).collect();
            format!("{}: {}", field, codes.join(", "))
        })
        .collect();
    fields.sort();
    fields.join("; ")
}

/// HTML forms submit empty inputs as "", treat those as absent
pub fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}

/// Italian fiscal code: 16 alphanumerics for people, 11 digits for
/// organisations
pub fn validate_fiscal_code(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    let personal = value.len() == 16 && value.chars().all(|c| c.is_ascii_alphanumeric());
    let organisation = value.len() == 11 && value.chars().all(|c| c.is_ascii_digit());

    if personal || organisation {
        Ok(())
    } else {
        Err(ValidationError::new("fiscal_code"))
    }
}

/// Money fields are typed as text and parsed into cents
pub fn validate_amount(value: &str) -> Result<(), ValidationError> {
    match crate::db::models::parse_cents(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("amount")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, Validate)]
    struct Sample {
        #[validate(email)]
        email: String,
        #[serde(default, deserialize_with = "empty_as_none")]
        #[validate(custom(function = "validate_fiscal_code"))]
        fiscal_code: Option<String>,
    }

    #[test]
    fn test_fiscal_code_rules() {
        assert!(validate_fiscal_code("RSSMRA80A01H501U").is_ok());
        assert!(validate_fiscal_code("01234567890").is_ok());
        assert!(validate_fiscal_code("RSSMRA80A01").is_err());
        assert!(validate_fiscal_code("RSSMRA80A01H501!").is_err());
    }

    #[test]
    fn test_empty_input_becomes_none() {
        let sample: Sample =
            serde_json::from_str(r#"{"email": "a@example.com", "fiscal_code": "  "}"#).unwrap();
        assert_eq!(sample.fiscal_code, None);
        assert!(validate_form(&sample).is_ok());
    }

    #[test]
    fn test_validate_form_reports_fields() {
        let sample = Sample {
            email: "not-an-email".to_string(),
            fiscal_code: Some("bad".to_string()),
        };
        match validate_form(&sample) {
            Err(AppError::Validation(msg)) => {
                assert!(msg.contains("email"));
                assert!(msg.contains("fiscal_code"));
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount("25.00").is_ok());
        assert!(validate_amount("x").is_err());
    }
}
