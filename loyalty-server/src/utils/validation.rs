//! Input validation helpers
//!
//! Centralized text length constants and validation functions for API
//! payloads. SQLite TEXT has no built-in length enforcement.

use crate::utils::AppError;

// ── Text length limits ──────────────────────────────────────────────

/// Identifiers: guest ids, property ids, group ids, account ids
pub const MAX_ID_LEN: usize = 128;

/// Display names, reward names
pub const MAX_NAME_LEN: usize = 200;

/// Descriptions, reasons, notes
pub const MAX_NOTE_LEN: usize = 500;

/// Booking / order / reward references
pub const MAX_REF_LEN: usize = 100;

/// Email addresses (RFC 5321)
pub const MAX_EMAIL_LEN: usize = 254;

/// Longest accepted lot lifetime (10 years)
pub const MAX_EXPIRATION_MONTHS: u32 = 120;

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> Result<(), AppError> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        )));
    }
    Ok(())
}

/// Validate an optional email: length limit and a single `@` with text on both sides.
pub fn validate_optional_email(value: &Option<String>, field: &str) -> Result<(), AppError> {
    validate_optional_text(value, field, MAX_EMAIL_LEN)?;
    if let Some(v) = value {
        let valid = match v.trim().split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && !domain.is_empty() && !domain.contains('@')
            }
            None => false,
        };
        if !valid {
            return Err(AppError::validation(format!("{field} is not a valid email")));
        }
    }
    Ok(())
}

/// Validate an optional lot lifetime in months.
pub fn validate_expiration_months(value: Option<u32>) -> Result<(), AppError> {
    if let Some(months) = value
        && (months == 0 || months > MAX_EXPIRATION_MONTHS)
    {
        return Err(AppError::validation(format!(
            "expiration_months must be between 1 and {MAX_EXPIRATION_MONTHS}"
        )));
    }
    Ok(())
}
