//! Authentication module for badgegate.
//!
//! This module provides password hashing and strength checks, the badge
//! credential store, one-time code challenges and established sessions.

mod credentials;
mod otp;
mod password;
mod session;
pub mod validation;

pub use credentials::{
    mask_contact, CredentialError, CredentialStore, UserAccount, VerificationMethod,
    DEFAULT_CONTACT,
};
pub use otp::{
    generate_code, IssuedOtp, LogDelivery, OtpChallenge, OtpDelivery, OtpError, OtpManager,
    OtpPolicy, DEFAULT_MAX_OTP_ATTEMPTS, DEFAULT_OTP_TTL_SECS, OTP_MAX, OTP_MIN,
};
pub use password::{
    hash_password, password_strength, strength_criteria, verify_password, HashCost,
    PasswordError, PasswordStrength, MAX_PASSWORD_LENGTH, PASSWORD_SYMBOLS,
};
pub use session::{AuthSession, ACTIVITY_EXTENSION_SECS};
pub use validation::ValidationError;
