//! Behavioral risk scoring for logins.
//!
//! A login is scored against weighted histograms of past login outcomes
//! (hour of day, weekday, device, network) blended with the badge's stored
//! profile score. The resulting tier decides the session timeout.

mod model;
mod profile;
mod scorer;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use model::{RiskWeights, FAILURE_DELTA, SUCCESS_DELTA, UNSEEN_WEIGHT};
pub use profile::{ProfileStore, UserProfile, DEFAULT_PROFILE_RISK, INITIAL_PROFILE_RISK};
pub use scorer::{RiskAssessment, RiskScorer};

/// Coarse risk classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    /// Matches historical behavior.
    #[default]
    Low,
    /// Some unusual patterns.
    Medium,
    /// Significant deviation.
    High,
}

impl RiskTier {
    /// Session inactivity timeout for this tier, in seconds.
    pub fn timeout_secs(&self) -> u64 {
        match self {
            RiskTier::Low => 360,
            RiskTier::Medium => 240,
            RiskTier::High => 120,
        }
    }

    /// Tier for a blended score.
    pub fn from_score(score: f64) -> Self {
        if score > 0.8 {
            RiskTier::Low
        } else if score > 0.5 {
            RiskTier::Medium
        } else {
            RiskTier::High
        }
    }

    /// Human-readable explanation of the tier.
    pub fn rationale(&self) -> &'static str {
        match self {
            RiskTier::Low => "Login pattern matches historical behavior",
            RiskTier::Medium => "Some unusual patterns detected",
            RiskTier::High => "Significant deviation from normal behavior",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => write!(f, "low"),
            RiskTier::Medium => write!(f, "medium"),
            RiskTier::High => write!(f, "high"),
        }
    }
}

/// Coarse attributes of the client performing a login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Device or user-agent string.
    pub device: String,
    /// Network address.
    pub network: String,
}

impl ClientInfo {
    /// Create client attributes.
    pub fn new(device: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            network: network.into(),
        }
    }
}

/// A login to be scored.
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    /// Badge logging in.
    pub badge_id: String,
    /// When the login happened.
    pub timestamp: DateTime<Utc>,
    /// Client attributes.
    pub client: ClientInfo,
}
