//! Input validation utilities
//!
//! Custom validators referenced from `#[validate(custom(...))]` attributes on
//! request bodies.

use validator::ValidationError;

/// Longest accepted username, in bytes
pub const MAX_USERNAME_LEN: usize = 64;

/// Longest accepted stock keeping unit, in bytes
pub const MAX_SKU_LEN: usize = 32;

/// Usernames travel inside Basic credentials, so they cannot contain the
/// `:` separator or control characters.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(ValidationError::new("too_long"));
    }
    if username.contains(':') || username.chars().any(char::is_control) {
        return Err(ValidationError::new("invalid_character"));
    }
    Ok(())
}

/// Reject passwords made only of whitespace
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// SKUs are upper-case alphanumerics separated by dashes
pub fn validate_sku(sku: &str) -> Result<(), ValidationError> {
    if sku.is_empty() || sku.len() > MAX_SKU_LEN {
        return Err(ValidationError::new("length"));
    }
    if sku.starts_with('-') || sku.ends_with('-') {
        return Err(ValidationError::new("format"));
    }
    if !sku
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ValidationError::new("format"));
    }
    Ok(())
}
