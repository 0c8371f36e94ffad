//! Input validation for registration and login forms.

use thiserror::Error;

use crate::auth::password::{password_strength, PasswordStrength};

/// Maximum badge identifier length.
pub const MAX_BADGE_ID_LENGTH: usize = 64;

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was empty.
    #[error("{0} is required")]
    FieldMissing(&'static str),

    /// Badge identifier is too long.
    #[error("badge ID must be at most {MAX_BADGE_ID_LENGTH} characters")]
    BadgeIdTooLong,

    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Password classified as weak.
    #[error("password is too weak")]
    WeakPassword,
}

impl ValidationError {
    /// Message shown to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            ValidationError::FieldMissing(_) => "Please fill in all fields",
            ValidationError::BadgeIdTooLong => "Badge ID is too long",
            ValidationError::PasswordMismatch => "Passwords do not match",
            ValidationError::WeakPassword => "Please use a stronger password",
        }
    }
}

/// Normalize and validate a badge identifier.
///
/// Surrounding whitespace is removed; the trimmed value is returned.
pub fn validate_badge_id(badge_id: &str) -> Result<&str, ValidationError> {
    let trimmed = badge_id.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::FieldMissing("badge ID"));
    }
    if trimmed.chars().count() > MAX_BADGE_ID_LENGTH {
        return Err(ValidationError::BadgeIdTooLong);
    }
    Ok(trimmed)
}

/// Validate a login form. Returns the trimmed badge identifier.
pub fn validate_login<'a>(badge_id: &'a str, password: &str) -> Result<&'a str, ValidationError> {
    let badge_id = validate_badge_id(badge_id)?;
    if password.is_empty() {
        return Err(ValidationError::FieldMissing("password"));
    }
    Ok(badge_id)
}

/// Validate a registration form. Returns the trimmed badge identifier.
///
/// Checks, in order: all fields present, password matches confirmation,
/// password is not weak.
///
/// # Examples
///
/// ```
/// use badgegate::auth::validation::{validate_registration, ValidationError};
///
/// assert_eq!(validate_registration(" badge001 ", "Str0ng!Pass", "Str0ng!Pass"), Ok("badge001"));
/// assert_eq!(
///     validate_registration("badge001", "Str0ng!Pass", "Str0ng!Pas"),
///     Err(ValidationError::PasswordMismatch)
/// );
/// ```
pub fn validate_registration<'a>(
    badge_id: &'a str,
    password: &str,
    confirm_password: &str,
) -> Result<&'a str, ValidationError> {
    let badge_id = validate_badge_id(badge_id)?;
    if password.is_empty() {
        return Err(ValidationError::FieldMissing("password"));
    }
    if confirm_password.is_empty() {
        return Err(ValidationError::FieldMissing("password confirmation"));
    }
    if password != confirm_password {
        return Err(ValidationError::PasswordMismatch);
    }
    if password_strength(password) == PasswordStrength::Weak {
        return Err(ValidationError::WeakPassword);
    }
    Ok(badge_id)
}
