//! Authentication audit log.
//!
//! Events are kept most recent first and capped at [`MAX_AUTH_LOGS`]
//! entries. Login events double as training input for the risk model.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::risk::{ClientInfo, RiskTier};
use crate::storage::{load_json, save_json, Collection, Storage};
use crate::Result;

/// Maximum number of retained events.
pub const MAX_AUTH_LOGS: usize = 100;

/// Number of events shown as recent activity.
pub const RECENT_ACTIVITY_LIMIT: usize = 5;

/// One audited authentication event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginEvent {
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Badge involved.
    pub badge_id: String,
    /// Whether the step succeeded.
    pub success: bool,
    /// Free-text description.
    pub message: String,
    /// Risk tier at the time.
    pub risk_level: RiskTier,
    /// Client network address.
    pub ip_address: String,
    /// Client device string.
    pub user_agent: String,
    /// Hour of day in the scoring time zone.
    pub time_of_day: u32,
}

impl LoginEvent {
    /// Build an event from client attributes.
    pub fn new(
        badge_id: &str,
        success: bool,
        message: impl Into<String>,
        risk_level: RiskTier,
        client: &ClientInfo,
        timestamp: DateTime<Utc>,
        tz: Tz,
    ) -> Self {
        Self {
            timestamp,
            badge_id: badge_id.to_string(),
            success,
            message: message.into(),
            risk_level,
            ip_address: client.network.clone(),
            user_agent: client.device.clone(),
            time_of_day: timestamp.with_timezone(&tz).hour(),
        }
    }

    /// How the event is presented in an activity listing.
    pub fn kind(&self) -> ActivityKind {
        if !self.success {
            ActivityKind::Failure
        } else if self.risk_level == RiskTier::High {
            ActivityKind::Warning
        } else {
            ActivityKind::Success
        }
    }
}

/// Presentation class of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    /// Successful step at low or medium risk.
    Success,
    /// Successful step at high risk.
    Warning,
    /// Failed step.
    Failure,
}

/// Capped, most-recent-first event log.
#[derive(Debug, Default)]
pub struct AuditLog {
    events: Vec<LoginEvent>,
}

impl AuditLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the log from storage.
    pub fn load(storage: &dyn Storage) -> Result<Self> {
        let mut events: Vec<LoginEvent> = load_json(storage, Collection::AuthLogs)?;
        events.truncate(MAX_AUTH_LOGS);
        Ok(Self { events })
    }

    /// Persist the log.
    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        save_json(storage, Collection::AuthLogs, &self.events)
    }

    /// Prepend an event, dropping the oldest beyond the cap.
    pub fn record(&mut self, event: LoginEvent) -> &LoginEvent {
        info!(
            badge_id = %event.badge_id,
            success = event.success,
            risk = %event.risk_level,
            "{}",
            event.message
        );
        self.events.insert(0, event);
        self.events.truncate(MAX_AUTH_LOGS);
        &self.events[0]
    }

    /// All events, most recent first.
    pub fn events(&self) -> &[LoginEvent] {
        &self.events
    }

    /// Most recent events of one badge.
    pub fn recent_for(&self, badge_id: &str, limit: usize) -> Vec<&LoginEvent> {
        self.events
            .iter()
            .filter(|e| e.badge_id == badge_id)
            .take(limit)
            .collect()
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
