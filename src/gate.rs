//! The badge login flow.
//!
//! [`Gate`] ties the credential store, one-time code challenges and the risk
//! scorer together:
//!
//! 1. `login` checks the badge password and issues a code,
//! 2. `submit_otp` checks the code, scores the login and opens a session.
//!
//! Every mutating call persists the collections it touched before returning.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::audit::{AuditLog, LoginEvent};
use crate::auth::validation::{validate_login, validate_registration, ValidationError};
use crate::auth::{
    AuthSession, CredentialError, CredentialStore, LogDelivery, OtpDelivery, OtpError,
    OtpManager, OtpPolicy, UserAccount, VerificationMethod,
};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::risk::{ClientInfo, LoginAttempt, ProfileStore, RiskScorer, RiskTier};
use crate::storage::{Collection, Storage};
use crate::BadgeGateError;

/// Errors surfaced by the login flow.
#[derive(Error, Debug)]
pub enum LoginError {
    /// Form input rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Registration or credential check failed.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// One-time code rejected.
    #[error(transparent)]
    Otp(#[from] OtpError),

    /// Persistence or delivery failed.
    #[error(transparent)]
    Internal(#[from] BadgeGateError),
}

impl LoginError {
    /// Message shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            LoginError::Validation(e) => e.user_message().to_string(),
            LoginError::Credential(e) => e.user_message().to_string(),
            LoginError::Otp(e) => e.user_message(),
            LoginError::Internal(_) => "Something went wrong, please try again".to_string(),
        }
    }
}

/// Registration form input.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    /// Desired badge ID.
    pub badge_id: String,
    /// Password.
    pub password: String,
    /// Password confirmation.
    pub confirm_password: String,
    /// Where codes are delivered.
    pub verification_method: VerificationMethod,
    /// Email address or phone number.
    pub contact: Option<String>,
}

impl RegistrationRequest {
    /// Create a request delivering codes to the default email contact.
    pub fn new(
        badge_id: impl Into<String>,
        password: impl Into<String>,
        confirm_password: impl Into<String>,
    ) -> Self {
        Self {
            badge_id: badge_id.into(),
            password: password.into(),
            confirm_password: confirm_password.into(),
            verification_method: VerificationMethod::Email,
            contact: None,
        }
    }

    /// Set the delivery channel and destination.
    pub fn with_contact(
        mut self,
        verification_method: VerificationMethod,
        contact: impl Into<String>,
    ) -> Self {
        self.verification_method = verification_method;
        self.contact = Some(contact.into());
        self
    }
}

/// Where a code was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpDispatch {
    /// Delivery channel.
    pub verification_method: VerificationMethod,
    /// Destination, masked.
    pub masked_contact: String,
    /// When the code expires.
    pub expires_at: DateTime<Utc>,
}

/// The login flow and the state it owns.
pub struct Gate {
    storage: Box<dyn Storage>,
    clock: Arc<dyn Clock>,
    delivery: Box<dyn OtpDelivery>,
    credentials: CredentialStore,
    otp: OtpManager,
    audit: AuditLog,
    profiles: ProfileStore,
    scorer: RiskScorer,
    awaiting_otp: HashSet<String>,
}

impl Gate {
    /// Validate `config` and load all collections from `storage`.
    ///
    /// Uses the system clock and logs codes instead of sending them; see
    /// [`with_clock`](Self::with_clock) and [`with_delivery`](Self::with_delivery).
    pub fn open(config: &Config, storage: Box<dyn Storage>) -> crate::Result<Self> {
        config.validate()?;
        let tz = config.risk.tz()?;
        let credentials = CredentialStore::load(storage.as_ref(), config.auth.hash_cost())?;
        let audit = AuditLog::load(storage.as_ref())?;
        let profiles = ProfileStore::load(storage.as_ref())?;
        let scorer = RiskScorer::load(storage.as_ref(), tz)?;

        info!(
            accounts = credentials.len(),
            events = audit.len(),
            "Login gate ready"
        );

        Ok(Self {
            storage,
            clock: Arc::new(SystemClock),
            delivery: Box::new(LogDelivery),
            credentials,
            otp: OtpManager::new(OtpPolicy::from(&config.auth)),
            audit,
            profiles,
            scorer,
            awaiting_otp: HashSet::new(),
        })
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the code delivery channel.
    pub fn with_delivery(mut self, delivery: Box<dyn OtpDelivery>) -> Self {
        self.delivery = delivery;
        self
    }

    /// Current time according to the gate's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Register a new badge.
    pub fn register(
        &mut self,
        request: &RegistrationRequest,
        client: &ClientInfo,
    ) -> Result<UserAccount, LoginError> {
        let badge_id = validate_registration(
            &request.badge_id,
            &request.password,
            &request.confirm_password,
        )?;
        let now = self.clock.now();

        let account = self
            .credentials
            .register(
                badge_id,
                &request.password,
                request.verification_method,
                request.contact.as_deref(),
                now,
            )?
            .clone();
        self.profiles.initialize(badge_id, client);
        let event = self.event(badge_id, true, "Registration successful", RiskTier::Low, client, now);
        self.audit.record(event);

        self.persist(&[Collection::Accounts, Collection::Profiles, Collection::AuthLogs])?;
        Ok(account)
    }

    /// Check a badge password and issue a one-time code.
    ///
    /// Any code already pending for the badge is replaced.
    pub fn login(
        &mut self,
        badge_id: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<OtpDispatch, LoginError> {
        let badge_id = validate_login(badge_id, password)?;
        let now = self.clock.now();

        let account = match self.credentials.verify(badge_id, password).cloned() {
            Ok(account) => account,
            Err(CredentialError::InvalidCredentials) => {
                self.awaiting_otp.remove(badge_id);
                self.otp.cancel(badge_id);
                self.record_login(badge_id, false, "Failed login attempt", RiskTier::Low, client, now);
                if self.credentials.exists(badge_id) {
                    self.profiles.record_failure(badge_id);
                }
                self.persist(&[Collection::AuthLogs, Collection::RiskModel, Collection::Profiles])?;
                return Err(CredentialError::InvalidCredentials.into());
            }
            Err(e) => return Err(e.into()),
        };

        let dispatch = self.issue_for(&account, now)?;
        self.awaiting_otp.insert(badge_id.to_string());
        Ok(dispatch)
    }

    /// Issue a fresh code for a badge that passed the password check.
    pub fn resend_otp(&mut self, badge_id: &str) -> Result<OtpDispatch, LoginError> {
        let badge_id = badge_id.trim();
        if !self.awaiting_otp.contains(badge_id) {
            return Err(OtpError::NoChallenge.into());
        }
        let account = self
            .credentials
            .get(badge_id)
            .cloned()
            .ok_or(OtpError::NoChallenge)?;

        let now = self.clock.now();
        let dispatch = self.issue_for(&account, now)?;
        info!(badge_id = %badge_id, "One-time code resent");
        Ok(dispatch)
    }

    /// Check a submitted code; on success score the login and open a session.
    ///
    /// After the attempt cap is reached the badge has to start over with
    /// [`login`](Self::login).
    pub fn submit_otp(
        &mut self,
        badge_id: &str,
        code: &str,
        client: &ClientInfo,
    ) -> Result<AuthSession, LoginError> {
        let badge_id = badge_id.trim();
        let now = self.clock.now();

        match self.otp.verify(badge_id, code, now) {
            Ok(()) => {}
            Err(OtpError::Blocked) => {
                // Only the transition into the blocked state is a login event.
                if self.awaiting_otp.remove(badge_id) {
                    self.record_login(badge_id, false, "Too many attempts", RiskTier::High, client, now);
                    self.persist(&[Collection::AuthLogs, Collection::RiskModel])?;
                }
                return Err(OtpError::Blocked.into());
            }
            Err(OtpError::Expired) => {
                let event = self.event(badge_id, false, "Code expired", RiskTier::Low, client, now);
                self.audit.record(event);
                self.persist(&[Collection::AuthLogs])?;
                return Err(OtpError::Expired.into());
            }
            Err(e) => return Err(e.into()),
        }

        self.awaiting_otp.remove(badge_id);
        let attempt = LoginAttempt {
            badge_id: badge_id.to_string(),
            timestamp: now,
            client: client.clone(),
        };
        let assessment = self
            .scorer
            .score(&attempt, self.profiles.risk_score(badge_id));
        let tier = assessment.tier;

        self.record_login(badge_id, true, "Successful login", tier, client, now);
        self.profiles.record_success(badge_id, client, now);
        self.persist(&[Collection::AuthLogs, Collection::RiskModel, Collection::Profiles])?;

        if !assessment.insights.is_empty() {
            warn!(badge_id = %badge_id, insights = ?assessment.insights, "Unusual login");
        }
        info!(badge_id = %badge_id, %tier, timeout = assessment.recommended_timeout_secs, "Session established");
        Ok(AuthSession::new(badge_id, assessment, now))
    }

    /// Register activity on a session; returns whether it was extended.
    pub fn record_activity(&self, session: &mut AuthSession) -> bool {
        session.record_activity(self.clock.now())
    }

    /// End a session at the user's request.
    pub fn logout(&mut self, session: AuthSession, client: &ClientInfo) -> Result<(), LoginError> {
        self.end_session(session, "User logged out", client)
    }

    /// End a session whose inactivity timeout elapsed.
    pub fn expire_session(
        &mut self,
        session: AuthSession,
        client: &ClientInfo,
    ) -> Result<(), LoginError> {
        self.end_session(session, "Session timed out", client)
    }

    /// Drop a pending login, e.g. when the user walks away from the prompt.
    pub fn abandon(&mut self, badge_id: &str) {
        self.awaiting_otp.remove(badge_id);
        self.otp.cancel(badge_id);
    }

    /// Whether a badge passed the password check and still owes a code.
    pub fn is_awaiting_otp(&self, badge_id: &str) -> bool {
        self.awaiting_otp.contains(badge_id)
    }

    /// Most recent audit entries of a badge.
    pub fn recent_activity(&self, badge_id: &str, limit: usize) -> Vec<&LoginEvent> {
        self.audit.recent_for(badge_id, limit)
    }

    /// Registered accounts.
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Pending challenges.
    pub fn otp(&self) -> &OtpManager {
        &self.otp
    }

    /// The audit log.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Behavioral profiles.
    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    /// The risk scorer.
    pub fn scorer(&self) -> &RiskScorer {
        &self.scorer
    }

    fn end_session(
        &mut self,
        session: AuthSession,
        message: &str,
        client: &ClientInfo,
    ) -> Result<(), LoginError> {
        let now = self.clock.now();
        let event = self.event(&session.badge_id, true, message, session.tier(), client, now);
        self.audit.record(event);
        self.persist(&[Collection::AuthLogs])?;
        Ok(())
    }

    fn issue_for(
        &mut self,
        account: &UserAccount,
        now: DateTime<Utc>,
    ) -> Result<OtpDispatch, LoginError> {
        let issued = self.otp.issue(&account.badge_id, now);
        self.delivery
            .deliver(account, &issued.code, issued.expires_at)?;
        Ok(OtpDispatch {
            verification_method: account.verification_method,
            masked_contact: account.masked_contact(),
            expires_at: issued.expires_at,
        })
    }

    fn event(
        &self,
        badge_id: &str,
        success: bool,
        message: &str,
        tier: RiskTier,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> LoginEvent {
        LoginEvent::new(badge_id, success, message, tier, client, now, self.scorer.tz())
    }

    /// Log a login outcome and train the risk model on it, exactly once.
    fn record_login(
        &mut self,
        badge_id: &str,
        success: bool,
        message: &str,
        tier: RiskTier,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) {
        let event = self.event(badge_id, success, message, tier, client, now);
        let logged = self.audit.record(event);
        self.scorer.train(logged);
    }

    fn persist(&self, collections: &[Collection]) -> crate::Result<()> {
        let storage = self.storage.as_ref();
        for collection in collections {
            match collection {
                Collection::Accounts => self.credentials.save(storage)?,
                Collection::AuthLogs => self.audit.save(storage)?,
                Collection::Profiles => self.profiles.save(storage)?,
                Collection::RiskModel => self.scorer.save(storage)?,
            }
        }
        Ok(())
    }
}
