//! Password hashing and strength classification.
//!
//! Digests are Argon2id PHC strings with a random salt per password.

use std::fmt;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum password length in bytes accepted for hashing.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Minimum length (in characters) counted towards password strength.
pub const STRONG_MIN_LENGTH: usize = 8;

/// Characters that count as symbols for strength classification.
pub const PASSWORD_SYMBOLS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Password-related errors.
#[derive(Error, Debug)]
pub enum PasswordError {
    /// Password is too long.
    #[error("password must be at most {MAX_PASSWORD_LENGTH} bytes")]
    TooLong,

    /// Argon2 rejected the cost parameters.
    #[error("invalid hashing parameters: {0}")]
    InvalidParams(String),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    HashError(String),

    /// Stored digest is not a PHC string.
    #[error("invalid password hash format")]
    InvalidHash,

    /// Password verification failed (wrong password).
    #[error("password verification failed")]
    VerificationFailed,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for HashCost {
    /// 64 MiB, 3 passes, 4 lanes.
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl HashCost {
    /// The smallest cost Argon2 accepts. Only for tests.
    pub fn minimal() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    /// Build Argon2 parameters, rejecting out-of-range values.
    pub fn params(&self) -> Result<Params, PasswordError> {
        Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))
    }

    fn argon2(&self) -> Result<Argon2<'static>, PasswordError> {
        Ok(Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            self.params()?,
        ))
    }
}

/// Hash a password using Argon2id.
///
/// Returns a PHC-formatted hash string that includes the salt and parameters.
///
/// # Examples
///
/// ```
/// use badgegate::auth::{hash_password, HashCost};
///
/// let hash = hash_password("Str0ng!Pass", &HashCost::minimal()).unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str, cost: &HashCost) -> Result<String, PasswordError> {
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(PasswordError::TooLong);
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = cost
        .argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
///
/// The cost parameters are read from the stored hash, so digests created
/// under an older configuration keep verifying.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| PasswordError::VerificationFailed)
}

/// Coarse password strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordStrength {
    /// Zero to two criteria satisfied.
    Weak,
    /// Three or four criteria satisfied.
    Medium,
    /// All five criteria satisfied.
    Strong,
}

impl PasswordStrength {
    /// Classify by the number of satisfied criteria.
    pub fn from_criteria_count(count: usize) -> Self {
        match count {
            0..=2 => PasswordStrength::Weak,
            3 | 4 => PasswordStrength::Medium,
            _ => PasswordStrength::Strong,
        }
    }

    /// Hint shown next to the password field.
    pub fn hint(&self) -> &'static str {
        match self {
            PasswordStrength::Weak => {
                "Weak password (Use at least 8 characters with numbers, symbols, and capital letters)"
            }
            PasswordStrength::Medium => "Medium strength (Add more variety of characters)",
            PasswordStrength::Strong => "Strong password",
        }
    }
}

impl fmt::Display for PasswordStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordStrength::Weak => write!(f, "weak"),
            PasswordStrength::Medium => write!(f, "medium"),
            PasswordStrength::Strong => write!(f, "strong"),
        }
    }
}

/// Count the strength criteria a password satisfies.
///
/// Criteria: at least 8 characters, an uppercase letter, a lowercase letter,
/// a digit, and a symbol from [`PASSWORD_SYMBOLS`].
pub fn strength_criteria(password: &str) -> usize {
    [
        password.chars().count() >= STRONG_MIN_LENGTH,
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)),
    ]
    .into_iter()
    .filter(|passed| *passed)
    .count()
}

/// Classify a password's strength.
///
/// # Examples
///
/// ```
/// use badgegate::auth::{password_strength, PasswordStrength};
///
/// assert_eq!(password_strength("abc"), PasswordStrength::Weak);
/// assert_eq!(password_strength("Str0ng!Pass"), PasswordStrength::Strong);
/// ```
pub fn password_strength(password: &str) -> PasswordStrength {
    PasswordStrength::from_criteria_count(strength_criteria(password))
}
