//! Input validation for API requests.
//!
//! Validators return `Err(message)` so handlers can collect several failures
//! with `ValidationErrorBuilder` from the `error` module.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Pragmatic email check: something@something.tld, no whitespace
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^\s@]+@[^\s@]+\.[^\s@]+$"
    ).unwrap();

    /// Reset codes are six ASCII digits
    static ref OTP_REGEX: Regex = Regex::new(r"^\d{6}$").unwrap();
}

/// Upper bound for free-text fields such as names and destinations
const MAX_TEXT_LEN: usize = 200;

pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

pub fn validate_password(password: &str, min_length: usize) -> Result<(), String> {
    if password.chars().count() < min_length {
        return Err(format!(
            "Password must be at least {} characters",
            min_length
        ));
    }

    if password.len() > 1024 {
        return Err("Password is too long".to_string());
    }

    Ok(())
}

/// Required free-text field (names, destinations, descriptions)
pub fn validate_required_text(value: &str, field_name: &str) -> Result<(), String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if value.chars().count() > MAX_TEXT_LEN {
        return Err(format!(
            "{} is too long (max {} characters)",
            field_name, MAX_TEXT_LEN
        ));
    }

    Ok(())
}

pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), String> {
    if start > end {
        return Err("Start date must be on or before the end date".to_string());
    }
    Ok(())
}

pub fn validate_otp(otp: &str) -> Result<(), String> {
    if !OTP_REGEX.is_match(otp.trim()) {
        return Err("OTP must be a 6-digit code".to_string());
    }
    Ok(())
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}
