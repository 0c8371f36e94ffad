//! Badge account registration and credential checks.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::password::{hash_password, verify_password, HashCost, PasswordError};
use crate::storage::{load_json, save_json, Collection, Storage};
use crate::Result;

/// Contact used when an account was registered without one.
pub const DEFAULT_CONTACT: &str = "default@example.com";

/// Credential errors.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Badge ID is already registered.
    #[error("badge ID already registered")]
    AlreadyExists,

    /// Unknown badge or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Password hashing failed.
    #[error("password error: {0}")]
    Password(#[from] PasswordError),
}

impl CredentialError {
    /// Message shown to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            CredentialError::AlreadyExists => "Badge ID already registered",
            CredentialError::InvalidCredentials => "Invalid badge ID or password",
            CredentialError::Password(_) => "Unable to process password",
        }
    }
}

/// Channel used to deliver one-time codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMethod {
    /// Code sent by email.
    #[default]
    Email,
    /// Code sent by SMS.
    Phone,
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationMethod::Email => write!(f, "email"),
            VerificationMethod::Phone => write!(f, "phone"),
        }
    }
}

/// A registered badge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    /// Unique badge identifier.
    pub badge_id: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    /// Registration time.
    pub registered_on: DateTime<Utc>,
    /// Where one-time codes go.
    pub verification_method: VerificationMethod,
    /// Email address or phone number.
    pub contact: String,
}

impl UserAccount {
    /// Contact destination safe to display.
    pub fn masked_contact(&self) -> String {
        mask_contact(&self.contact)
    }
}

/// Mask an email address or phone number for display.
///
/// Emails keep the first and last character of the local part and the
/// domain; anything else keeps its last four characters. Values too short
/// to keep anything are masked entirely.
///
/// # Examples
///
/// ```
/// use badgegate::auth::mask_contact;
///
/// assert_eq!(mask_contact("jane.doe@example.com"), "j******e@example.com");
/// assert_eq!(mask_contact("5551234567"), "******4567");
/// ```
pub fn mask_contact(info: &str) -> String {
    if let Some((local, domain)) = info.split_once('@') {
        let chars: Vec<char> = local.chars().collect();
        let masked = if chars.len() <= 2 {
            "*".repeat(chars.len())
        } else {
            format!(
                "{}{}{}",
                chars[0],
                "*".repeat(chars.len() - 2),
                chars[chars.len() - 1]
            )
        };
        format!("{masked}@{domain}")
    } else {
        let chars: Vec<char> = info.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let visible: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - 4), visible)
    }
}

/// Registered accounts, keyed by badge ID.
#[derive(Debug)]
pub struct CredentialStore {
    accounts: BTreeMap<String, UserAccount>,
    cost: HashCost,
}

impl CredentialStore {
    /// Create an empty store.
    pub fn new(cost: HashCost) -> Self {
        Self {
            accounts: BTreeMap::new(),
            cost,
        }
    }

    /// Load accounts from storage.
    pub fn load(storage: &dyn Storage, cost: HashCost) -> Result<Self> {
        let accounts: BTreeMap<String, UserAccount> = load_json(storage, Collection::Accounts)?;
        debug!(count = accounts.len(), "Loaded accounts");
        Ok(Self { accounts, cost })
    }

    /// Persist accounts.
    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        save_json(storage, Collection::Accounts, &self.accounts)
    }

    /// Register a new badge.
    ///
    /// Fails with [`CredentialError::AlreadyExists`] without touching the
    /// existing account.
    pub fn register(
        &mut self,
        badge_id: &str,
        password: &str,
        verification_method: VerificationMethod,
        contact: Option<&str>,
        now: DateTime<Utc>,
    ) -> std::result::Result<&UserAccount, CredentialError> {
        if self.accounts.contains_key(badge_id) {
            return Err(CredentialError::AlreadyExists);
        }

        let password_hash = hash_password(password, &self.cost)?;
        let account = UserAccount {
            badge_id: badge_id.to_string(),
            password_hash,
            registered_on: now,
            verification_method,
            contact: contact.unwrap_or(DEFAULT_CONTACT).to_string(),
        };

        info!(badge_id = %badge_id, method = %verification_method, "Badge registered");
        Ok(self.accounts.entry(badge_id.to_string()).or_insert(account))
    }

    /// Check a badge/password pair.
    ///
    /// Unknown badges and wrong passwords both yield
    /// [`CredentialError::InvalidCredentials`].
    pub fn verify(
        &self,
        badge_id: &str,
        password: &str,
    ) -> std::result::Result<&UserAccount, CredentialError> {
        let Some(account) = self.accounts.get(badge_id) else {
            debug!(badge_id = %badge_id, "Credential check for unknown badge");
            return Err(CredentialError::InvalidCredentials);
        };

        match verify_password(password, &account.password_hash) {
            Ok(()) => Ok(account),
            Err(PasswordError::VerificationFailed) => Err(CredentialError::InvalidCredentials),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a badge is registered.
    pub fn exists(&self, badge_id: &str) -> bool {
        self.accounts.contains_key(badge_id)
    }

    /// Look up an account.
    pub fn get(&self, badge_id: &str) -> Option<&UserAccount> {
        self.accounts.get(badge_id)
    }

    /// Number of registered badges.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether no badge is registered.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn store() -> CredentialStore {
        CredentialStore::new(HashCost::minimal())
    }

    #[test]
    fn test_register_and_verify() {
        let mut store = store();
        store
            .register("badge001", "Str0ng!Pass", VerificationMethod::Email, None, Utc::now())
            .unwrap();

        let account = store.verify("badge001", "Str0ng!Pass").unwrap();
        assert_eq!(account.badge_id, "badge001");
        assert_eq!(account.contact, DEFAULT_CONTACT);
        assert!(account.password_hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_register_duplicate_leaves_account_unchanged() {
        let mut store = store();
        let first = store
            .register("badge001", "Str0ng!Pass", VerificationMethod::Email, None, Utc::now())
            .unwrap()
            .clone();

        let result = store.register(
            "badge001",
            "0ther!Pass",
            VerificationMethod::Phone,
            Some("5551234567"),
            Utc::now(),
        );
        assert!(matches!(result, Err(CredentialError::AlreadyExists)));

        let current = store.get("badge001").unwrap();
        assert_eq!(current.password_hash, first.password_hash);
        assert_eq!(current.verification_method, VerificationMethod::Email);
        assert_eq!(store.len(), 1);
        assert!(store.verify("badge001", "0ther!Pass").is_err());
    }

    #[test]
    fn test_verify_wrong_password_and_unknown_badge_look_alike() {
        let mut store = store();
        store
            .register("badge001", "Str0ng!Pass", VerificationMethod::Email, None, Utc::now())
            .unwrap();

        let wrong = store.verify("badge001", "nope").unwrap_err();
        let unknown = store.verify("badge999", "Str0ng!Pass").unwrap_err();
        assert!(matches!(wrong, CredentialError::InvalidCredentials));
        assert!(matches!(unknown, CredentialError::InvalidCredentials));
        assert_eq!(wrong.user_message(), unknown.user_message());
    }

    #[test]
    fn test_exists() {
        let mut store = store();
        assert!(!store.exists("badge001"));
        assert!(store.is_empty());
        store
            .register("badge001", "Str0ng!Pass", VerificationMethod::Email, None, Utc::now())
            .unwrap();
        assert!(store.exists("badge001"));
        assert!(!store.exists("BADGE001"));
    }

    #[test]
    fn test_save_and_load() {
        let storage = MemoryStorage::new();
        let mut original = store();
        original
            .register(
                "badge001",
                "Str0ng!Pass",
                VerificationMethod::Phone,
                Some("5551234567"),
                Utc::now(),
            )
            .unwrap();
        original.save(&storage).unwrap();

        let loaded = CredentialStore::load(&storage, HashCost::minimal()).unwrap();
        assert_eq!(loaded.len(), 1);
        let account = loaded.verify("badge001", "Str0ng!Pass").unwrap();
        assert_eq!(account.verification_method, VerificationMethod::Phone);
        assert_eq!(account.masked_contact(), "******4567");
    }

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_contact("default@example.com"), "d*****t@example.com");
        assert_eq!(mask_contact("abc@x.io"), "a*c@x.io");
        assert_eq!(mask_contact("ab@x.io"), "**@x.io");
        assert_eq!(mask_contact("@x.io"), "@x.io");
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_contact("+15551234567"), "********4567");
        assert_eq!(mask_contact("1234"), "****");
        assert_eq!(mask_contact(""), "");
    }

    #[test]
    fn test_verification_method_serde() {
        let json = serde_json::to_string(&VerificationMethod::Phone).unwrap();
        assert_eq!(json, "\"phone\"");
        assert_eq!(VerificationMethod::default(), VerificationMethod::Email);
    }
}
