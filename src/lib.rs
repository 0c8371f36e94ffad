//! BadgeGate - badge login with one-time codes and risk-based sessions
//!
//! A badge holder logs in with a password, confirms with a six-digit code
//! sent out of band, and receives a session whose inactivity timeout is set
//! by a behavioral risk score.

pub mod audit;
pub mod auth;
pub mod clock;
pub mod config;
pub mod console;
pub mod datetime;
pub mod error;
pub mod gate;
pub mod logging;
pub mod risk;
pub mod storage;
pub mod timer;

pub use audit::{ActivityKind, AuditLog, LoginEvent, MAX_AUTH_LOGS, RECENT_ACTIVITY_LIMIT};
pub use auth::{
    hash_password, mask_contact, password_strength, verify_password, AuthSession,
    CredentialError, CredentialStore, HashCost, LogDelivery, OtpDelivery, OtpError, OtpManager,
    OtpPolicy, PasswordError, PasswordStrength, UserAccount, ValidationError, VerificationMethod,
};
pub use clock::{Clock, SimulatedClock, SystemClock};
pub use config::Config;
pub use console::{Command, CommandError, Console};
pub use error::{BadgeGateError, Result};
pub use gate::{Gate, LoginError, OtpDispatch, RegistrationRequest};
pub use risk::{
    ClientInfo, LoginAttempt, ProfileStore, RiskAssessment, RiskScorer, RiskTier, RiskWeights,
    UserProfile,
};
pub use storage::{Collection, FileStorage, MemoryStorage, Storage};
pub use timer::{SessionTimers, TimerEvent, TimerKind};
