//! Established sessions and inactivity timeout.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::risk::{RiskAssessment, RiskTier};

/// Seconds added to the remaining time on user activity.
pub const ACTIVITY_EXTENSION_SECS: i64 = 30;

/// Activity only extends a session whose remaining time is below this
/// fraction of the tier's timeout.
const EXTENSION_THRESHOLD: f64 = 0.8;

/// A session established after both factors succeeded.
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// Unique session token (UUID v4).
    pub token: String,
    /// Badge the session belongs to.
    pub badge_id: String,
    /// Risk assessment made at login.
    pub assessment: RiskAssessment,
    /// When the session was established.
    pub created_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
}

impl AuthSession {
    /// Start a session whose timeout follows the assessment's tier.
    pub fn new(badge_id: &str, assessment: RiskAssessment, now: DateTime<Utc>) -> Self {
        let deadline = now + Self::max_timeout_for(&assessment);
        Self {
            token: Uuid::new_v4().to_string(),
            badge_id: badge_id.to_string(),
            assessment,
            created_at: now,
            deadline,
        }
    }

    fn max_timeout_for(assessment: &RiskAssessment) -> Duration {
        Duration::seconds(i64::try_from(assessment.recommended_timeout_secs).unwrap_or(i64::MAX))
    }

    /// Risk tier of the session.
    pub fn tier(&self) -> RiskTier {
        self.assessment.tier
    }

    /// Longest inactivity the session tolerates.
    pub fn max_timeout(&self) -> Duration {
        Self::max_timeout_for(&self.assessment)
    }

    /// When the session ends unless extended.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Time left, or zero once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.deadline - now).max(Duration::zero())
    }

    /// Whether the inactivity timeout has elapsed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    /// Register user activity.
    ///
    /// When less than 80% of the tier's timeout remains, 30 seconds are
    /// added, never exceeding the tier's timeout. Returns whether the
    /// deadline moved. Expired sessions are not revived.
    pub fn record_activity(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_expired(now) {
            return false;
        }

        let remaining = self.remaining(now);
        let max = self.max_timeout();
        let threshold_ms = (max.num_milliseconds() as f64 * EXTENSION_THRESHOLD) as i64;
        if remaining.num_milliseconds() >= threshold_ms {
            return false;
        }

        let extended = (remaining + Duration::seconds(ACTIVITY_EXTENSION_SECS)).min(max);
        self.deadline = now + extended;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn assessment(tier: RiskTier) -> RiskAssessment {
        RiskAssessment {
            tier,
            score: 0.0,
            anomaly_score: 0.0,
            recommended_timeout_secs: tier.timeout_secs(),
            rationale: tier.rationale().to_string(),
            insights: Vec::new(),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_new_session_deadline_by_tier() {
        let low = AuthSession::new("badge001", assessment(RiskTier::Low), t0());
        let high = AuthSession::new("badge001", assessment(RiskTier::High), t0());

        assert_eq!(low.deadline(), t0() + Duration::seconds(360));
        assert_eq!(high.deadline(), t0() + Duration::seconds(120));
        assert_eq!(high.tier(), RiskTier::High);
        assert_ne!(low.token, high.token);
    }

    #[test]
    fn test_expiry() {
        let session = AuthSession::new("badge001", assessment(RiskTier::High), t0());

        assert!(!session.is_expired(t0() + Duration::seconds(119)));
        assert!(session.is_expired(t0() + Duration::seconds(120)));
        assert_eq!(
            session.remaining(t0() + Duration::seconds(500)),
            Duration::zero()
        );
    }

    #[test]
    fn test_activity_ignored_while_fresh() {
        let mut session = AuthSession::new("badge001", assessment(RiskTier::Medium), t0());
        // 200 of 240 seconds left, above the 80% threshold (192).
        let now = t0() + Duration::seconds(40);

        assert!(!session.record_activity(now));
        assert_eq!(session.deadline(), t0() + Duration::seconds(240));
    }

    #[test]
    fn test_activity_extends_by_thirty_seconds() {
        let mut session = AuthSession::new("badge001", assessment(RiskTier::Medium), t0());
        // 140 seconds left.
        let now = t0() + Duration::seconds(100);

        assert!(session.record_activity(now));
        assert_eq!(session.remaining(now), Duration::seconds(170));
    }

    #[test]
    fn test_activity_capped_at_tier_timeout() {
        let mut session = AuthSession::new("badge001", assessment(RiskTier::High), t0());
        // 90 seconds left; 80% of 120 is 96.
        let now = t0() + Duration::seconds(30);

        assert!(session.record_activity(now));
        assert_eq!(session.remaining(now), Duration::seconds(120));
    }

    #[test]
    fn test_expired_session_not_revived() {
        let mut session = AuthSession::new("badge001", assessment(RiskTier::High), t0());
        let now = t0() + Duration::seconds(121);

        assert!(!session.record_activity(now));
        assert!(session.is_expired(now));
    }
}
