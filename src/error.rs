//! Error types for badgegate.

use thiserror::Error;

/// Common error type for badgegate infrastructure.
///
/// User-facing authentication failures live in the per-module error enums
/// (`CredentialError`, `OtpError`, `LoginError`); this type covers the
/// plumbing underneath them.
#[derive(Error, Debug)]
pub enum BadgeGateError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted data could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Password hashing error.
    #[error("password error: {0}")]
    Password(#[from] crate::auth::PasswordError),

    /// Validation error for configuration or input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for badgegate operations.
pub type Result<T> = std::result::Result<T, BadgeGateError>;
