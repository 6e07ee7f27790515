//! # Text Input Validation Utilities
//!
//! Regex patterns and small validators shared by request payloads. The regexes are
//! referenced from `#[validate(regex(path = ...))]` attributes, the functions from
//! `#[validate(custom(function = ...))]` or directly by services.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use validator::ValidationError;

use crate::utils::constant::MIN_PASSWORD_LENGTH;

/// Email validation regex pattern
///
/// - `user@example.com` ✓ Valid
/// - `user@localhost` ✗ Invalid (no TLD)
pub static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("Failed to compile email regex")
});

/// North American phone number pattern with optional country code and separators
pub static PHONE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?1?[-.\s]?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}$")
        .expect("Failed to compile phone regex")
});

/// Five digit US zip code
pub static ZIP_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{5}$").expect("Failed to compile zip code regex"));

fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// Rejects passwords shorter than [`MIN_PASSWORD_LENGTH`] characters.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(validation_error(
            "password_length",
            "password must be at least 8 characters long",
        ));
    }
    Ok(())
}

/// Phone numbers are optional; an empty string passes.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.is_empty() || PHONE_REGEX.is_match(phone) {
        Ok(())
    } else {
        Err(validation_error("phone", "invalid phone number format"))
    }
}

/// Zip codes are optional; when present they must be five digits.
pub fn validate_zip_code(zip_code: &str) -> Result<(), ValidationError> {
    if zip_code.is_empty() || ZIP_CODE_REGEX.is_match(zip_code) {
        Ok(())
    } else {
        Err(validation_error("zip_code", "zip code must be 5 digits"))
    }
}

/// Ratings run from one to five stars inclusive.
pub fn validate_rating(rating: i16) -> Result<(), ValidationError> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(validation_error("rating", "rating must be between 1 and 5"))
    }
}

/// Trims surrounding whitespace from free-form user input.
#[inline]
pub fn sanitize(input: &str) -> String {
    input.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_requires_domain_and_tld() {
        assert!(EMAIL_REGEX.is_match("owner@example.com"));
        assert!(EMAIL_REGEX.is_match("first.last+tag@sub.domain.org"));
        assert!(!EMAIL_REGEX.is_match("invalid-email"));
        assert!(!EMAIL_REGEX.is_match("user@localhost"));
    }

    #[test]
    fn password_of_seven_chars_is_rejected() {
        let err = validate_password("1234567").unwrap_err();
        assert_eq!(
            err.message.as_deref(),
            Some("password must be at least 8 characters long")
        );
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn phone_accepts_common_formats() {
        for phone in ["5551234567", "555-123-4567", "(555) 123-4567", "+1 555.123.4567", ""] {
            assert!(validate_phone(phone).is_ok(), "{phone} should be valid");
        }
        assert!(validate_phone("12345").is_err());
    }

    #[test]
    fn zip_code_must_be_five_digits() {
        assert!(validate_zip_code("62701").is_ok());
        assert!(validate_zip_code("").is_ok());
        assert!(validate_zip_code("6270").is_err());
        assert!(validate_zip_code("62701-1234").is_err());
    }

    #[test]
    fn rating_bounds() {
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(6).is_err());
    }

    #[test]
    fn sanitize_trims() {
        assert_eq!(sanitize("  Front lawn  "), "Front lawn");
    }
}
