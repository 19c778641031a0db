//! Shipping details captured at checkout.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_NAME: usize = 100;
const MAX_ADDRESS_LINE: usize = 200;
const MAX_REGION: usize = 100;
const MAX_POSTAL_CODE: usize = 20;
const MIN_PHONE: usize = 7;
const MAX_PHONE: usize = 20;

/// Where an order is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub full_name: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone_number: String,
}

/// A field of [`ShippingDetails`] that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShippingValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("phone_number is not a valid phone number")]
    InvalidPhoneNumber,
}

impl ShippingDetails {
    /// Checks required fields, length limits and the phone number shape.
    pub fn validate(&self) -> Result<(), ShippingValidationError> {
        required("full_name", &self.full_name, MAX_NAME)?;
        required("address_line1", &self.address_line1, MAX_ADDRESS_LINE)?;
        if let Some(line2) = &self.address_line2 {
            max_len("address_line2", line2, MAX_ADDRESS_LINE)?;
        }
        required("city", &self.city, MAX_REGION)?;
        required("state", &self.state, MAX_REGION)?;
        required("postal_code", &self.postal_code, MAX_POSTAL_CODE)?;
        required("country", &self.country, MAX_REGION)?;
        required("phone_number", &self.phone_number, MAX_PHONE)?;

        if !is_phone_number(self.phone_number.trim()) {
            return Err(ShippingValidationError::InvalidPhoneNumber);
        }
        Ok(())
    }
}

fn required(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ShippingValidationError> {
    if value.trim().is_empty() {
        return Err(ShippingValidationError::Required { field });
    }
    max_len(field, value, max)
}

fn max_len(field: &'static str, value: &str, max: usize) -> Result<(), ShippingValidationError> {
    if value.chars().count() > max {
        return Err(ShippingValidationError::TooLong { field, max });
    }
    Ok(())
}

/// Digits with an optional leading `+`, separated by spaces, dashes or parentheses.
fn is_phone_number(value: &str) -> bool {
    let len = value.chars().count();
    if !(MIN_PHONE..=MAX_PHONE).contains(&len) {
        return false;
    }

    let body = value.strip_prefix('+').unwrap_or(value);
    let allowed = body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')'));
    let digits = body.chars().filter(char::is_ascii_digit).count();

    allowed && digits >= MIN_PHONE
}

#[cfg(test)]
pub(crate) fn sample() -> ShippingDetails {
    ShippingDetails {
        full_name: "Ana Souza".to_string(),
        address_line1: "Rua Augusta 100".to_string(),
        address_line2: None,
        city: "Lisboa".to_string(),
        state: "Lisboa".to_string(),
        postal_code: "1100-053".to_string(),
        country: "Portugal".to_string(),
        phone_number: "+351 912 345 678".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_details() {
        assert_eq!(sample().validate(), Ok(()));
    }

    #[test]
    fn test_missing_field() {
        let mut details = sample();
        details.city = "   ".to_string();
        assert_eq!(
            details.validate(),
            Err(ShippingValidationError::Required { field: "city" })
        );
    }

    #[test]
    fn test_too_long_fields() {
        let mut details = sample();
        details.postal_code = "1".repeat(21);
        assert_eq!(
            details.validate(),
            Err(ShippingValidationError::TooLong {
                field: "postal_code",
                max: 20
            })
        );

        let mut details = sample();
        details.address_line2 = Some("x".repeat(201));
        assert!(matches!(
            details.validate(),
            Err(ShippingValidationError::TooLong {
                field: "address_line2",
                ..
            })
        ));
    }

    #[test]
    fn test_phone_numbers() {
        assert!(is_phone_number("(21) 555-0199"));
        assert!(is_phone_number("+44 20 7946 0958"));
        assert!(is_phone_number("5550199"));
        assert!(!is_phone_number("555-01"));
        assert!(!is_phone_number("call me maybe"));
        assert!(!is_phone_number("++351912345678"));
        assert!(!is_phone_number("(--) ---- ----"));
    }

    #[test]
    fn test_invalid_phone_is_reported() {
        let mut details = sample();
        details.phone_number = "12ab567".to_string();
        assert_eq!(
            details.validate(),
            Err(ShippingValidationError::InvalidPhoneNumber)
        );
    }
}
