//! One-time code challenges.
//!
//! Each badge has at most one pending challenge. A challenge ends when the
//! right code is submitted, when it is found expired, when the attempt cap
//! is reached, or when a new code replaces it.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::auth::credentials::UserAccount;
use crate::config::AuthConfig;
use crate::Result;

/// Smallest code that can be issued.
pub const OTP_MIN: u32 = 100_000;

/// Largest code that can be issued.
pub const OTP_MAX: u32 = 999_999;

/// Default code lifetime (3 minutes).
pub const DEFAULT_OTP_TTL_SECS: i64 = 3 * 60;

/// Default number of wrong submissions before the challenge is blocked.
pub const DEFAULT_MAX_OTP_ATTEMPTS: u32 = 3;

/// OTP verification errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpError {
    /// Wrong code; the challenge is still pending.
    #[error("incorrect code, {remaining} attempts remaining")]
    WrongCode {
        /// Submissions left before the challenge is blocked.
        remaining: u32,
    },

    /// The challenge expired before a correct submission.
    #[error("code expired")]
    Expired,

    /// Too many wrong submissions.
    #[error("too many attempts")]
    Blocked,

    /// No challenge is pending for this badge.
    #[error("no pending challenge")]
    NoChallenge,
}

impl OtpError {
    /// Message shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            OtpError::WrongCode { remaining } => {
                format!("Incorrect code. {remaining} attempts remaining")
            }
            OtpError::Expired => "Code expired".to_string(),
            OtpError::Blocked => "Too many attempts".to_string(),
            OtpError::NoChallenge => "Authentication error".to_string(),
        }
    }
}

/// Lifetime and attempt cap of challenges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpPolicy {
    /// How long a code stays valid.
    pub ttl: Duration,
    /// Wrong submissions allowed.
    pub max_attempts: u32,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(DEFAULT_OTP_TTL_SECS),
            max_attempts: DEFAULT_MAX_OTP_ATTEMPTS,
        }
    }
}

impl From<&AuthConfig> for OtpPolicy {
    fn from(config: &AuthConfig) -> Self {
        Self {
            ttl: Duration::seconds(i64::try_from(config.otp_ttl_secs).unwrap_or(i64::MAX)),
            max_attempts: config.otp_max_attempts,
        }
    }
}

/// A pending challenge.
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    code: String,
    /// When the code was issued.
    pub issued_at: DateTime<Utc>,
    /// When the code stops being accepted.
    pub expires_at: DateTime<Utc>,
    /// Wrong submissions so far.
    pub attempts: u32,
}

impl OtpChallenge {
    /// Whether the challenge is past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Time left before expiry, or zero.
    pub fn time_left(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

/// A freshly issued code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedOtp {
    /// The 6-digit code.
    pub code: String,
    /// When it expires.
    pub expires_at: DateTime<Utc>,
}

/// Out-of-band channel carrying codes to the user.
pub trait OtpDelivery: Send + Sync {
    /// Dispatch a code to the account's contact destination.
    fn deliver(&self, account: &UserAccount, code: &str, expires_at: DateTime<Utc>) -> Result<()>;
}

/// Delivery that only writes the code to the log.
///
/// Stands in for an email or SMS transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDelivery;

impl OtpDelivery for LogDelivery {
    fn deliver(&self, account: &UserAccount, code: &str, expires_at: DateTime<Utc>) -> Result<()> {
        info!(
            badge_id = %account.badge_id,
            method = %account.verification_method,
            destination = %account.masked_contact(),
            code = %code,
            expires_at = %expires_at,
            "One-time code dispatched"
        );
        Ok(())
    }
}

/// Generate a uniformly random 6-digit code.
pub fn generate_code() -> String {
    rand::rng().random_range(OTP_MIN..=OTP_MAX).to_string()
}

/// Pending challenges, one per badge.
#[derive(Debug, Default)]
pub struct OtpManager {
    challenges: HashMap<String, OtpChallenge>,
    blocked: HashSet<String>,
    policy: OtpPolicy,
}

impl OtpManager {
    /// Create a manager with the given policy.
    pub fn new(policy: OtpPolicy) -> Self {
        Self {
            challenges: HashMap::new(),
            blocked: HashSet::new(),
            policy,
        }
    }

    /// The active policy.
    pub fn policy(&self) -> OtpPolicy {
        self.policy
    }

    /// Issue a new code for a badge, replacing any pending one.
    ///
    /// Also lifts a block left by a previous challenge.
    pub fn issue(&mut self, badge_id: &str, now: DateTime<Utc>) -> IssuedOtp {
        let code = generate_code();
        let expires_at = now + self.policy.ttl;

        let replaced = self
            .challenges
            .insert(
                badge_id.to_string(),
                OtpChallenge {
                    code: code.clone(),
                    issued_at: now,
                    expires_at,
                    attempts: 0,
                },
            )
            .is_some();
        self.blocked.remove(badge_id);

        debug!(badge_id = %badge_id, replaced, %expires_at, "Challenge issued");
        IssuedOtp { code, expires_at }
    }

    /// Check a submitted code.
    ///
    /// An expired challenge is removed when detected. Reaching the attempt
    /// cap removes the challenge and blocks the badge until the next
    /// [`issue`](Self::issue).
    pub fn verify(
        &mut self,
        badge_id: &str,
        submitted: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), OtpError> {
        if self.blocked.contains(badge_id) {
            return Err(OtpError::Blocked);
        }

        let Some(challenge) = self.challenges.get_mut(badge_id) else {
            return Err(OtpError::NoChallenge);
        };

        if challenge.is_expired(now) {
            self.challenges.remove(badge_id);
            debug!(badge_id = %badge_id, "Expired challenge removed");
            return Err(OtpError::Expired);
        }

        if submitted.trim() != challenge.code {
            challenge.attempts += 1;
            if challenge.attempts >= self.policy.max_attempts {
                self.challenges.remove(badge_id);
                self.blocked.insert(badge_id.to_string());
                warn!(badge_id = %badge_id, "Challenge blocked after too many attempts");
                return Err(OtpError::Blocked);
            }
            let remaining = self.policy.max_attempts - challenge.attempts;
            debug!(badge_id = %badge_id, remaining, "Wrong code submitted");
            return Err(OtpError::WrongCode { remaining });
        }

        self.challenges.remove(badge_id);
        Ok(())
    }

    /// Drop any challenge or block for a badge.
    pub fn cancel(&mut self, badge_id: &str) {
        self.challenges.remove(badge_id);
        self.blocked.remove(badge_id);
    }

    /// The pending challenge for a badge, if any.
    pub fn pending(&self, badge_id: &str) -> Option<&OtpChallenge> {
        self.challenges.get(badge_id)
    }

    /// Whether a badge is blocked.
    pub fn is_blocked(&self, badge_id: &str) -> bool {
        self.blocked.contains(badge_id)
    }

    /// Number of pending challenges.
    pub fn pending_count(&self) -> usize {
        self.challenges.len()
    }
}
