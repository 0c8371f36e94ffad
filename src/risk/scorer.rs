//! Scoring of login attempts against the weight model.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audit::LoginEvent;
use crate::risk::model::{hour_and_weekday, RiskWeights};
use crate::risk::{LoginAttempt, RiskTier};
use crate::storage::Storage;
use crate::Result;

const TIME_FACTOR: f64 = 0.3;
const DAY_FACTOR: f64 = 0.2;
const DEVICE_FACTOR: f64 = 0.3;
const LOCATION_FACTOR: f64 = 0.2;

/// Shift applied to every weight before weighting.
const WEIGHT_SHIFT: f64 = 2.0;

/// Share of the anomaly score in the blended score.
const ANOMALY_SHARE: f64 = 0.7;

/// Share of the stored profile score in the blended score.
const PROFILE_SHARE: f64 = 0.3;

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Outcome of scoring a login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Risk tier.
    pub tier: RiskTier,
    /// Blended score (higher is more familiar).
    pub score: f64,
    /// Score from the histograms alone.
    pub anomaly_score: f64,
    /// Session inactivity timeout for the tier.
    pub recommended_timeout_secs: u64,
    /// Why the tier was chosen.
    pub rationale: String,
    /// Individual unusual attributes.
    pub insights: Vec<String>,
}

/// Scores logins and learns from login events.
#[derive(Debug, Clone)]
pub struct RiskScorer {
    weights: RiskWeights,
    tz: Tz,
}

impl RiskScorer {
    /// Create a scorer over existing weights.
    pub fn new(weights: RiskWeights, tz: Tz) -> Self {
        Self { weights, tz }
    }

    /// Load weights from storage.
    pub fn load(storage: &dyn Storage, tz: Tz) -> Result<Self> {
        Ok(Self::new(RiskWeights::load(storage)?, tz))
    }

    /// Persist weights.
    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        self.weights.save(storage)
    }

    /// Current weights.
    pub fn weights(&self) -> &RiskWeights {
        &self.weights
    }

    /// Time zone used for hour and weekday buckets.
    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Histogram score of an attempt.
    ///
    /// Each looked-up weight is shifted by 2, the shifted values are combined
    /// with fixed factors and the sum divided by 4. Unseen devices and
    /// networks count as [`UNSEEN_WEIGHT`](crate::risk::UNSEEN_WEIGHT).
    pub fn anomaly_score(&self, attempt: &LoginAttempt) -> f64 {
        let (hour, day) = hour_and_weekday(attempt.timestamp, self.tz);
        let w = &self.weights;

        ((w.hour_weight(hour) + WEIGHT_SHIFT) * TIME_FACTOR
            + (w.day_weight(day) + WEIGHT_SHIFT) * DAY_FACTOR
            + (w.device_weight(&attempt.client.device) + WEIGHT_SHIFT) * DEVICE_FACTOR
            + (w.location_weight(&attempt.client.network) + WEIGHT_SHIFT) * LOCATION_FACTOR)
            / 4.0
    }

    /// Score an attempt, blending in the badge's stored profile score.
    pub fn score(&self, attempt: &LoginAttempt, profile_risk: f64) -> RiskAssessment {
        let anomaly_score = self.anomaly_score(attempt);
        let score = anomaly_score * ANOMALY_SHARE + profile_risk * PROFILE_SHARE;
        let tier = RiskTier::from_score(score);

        debug!(
            badge_id = %attempt.badge_id,
            anomaly_score,
            profile_risk,
            score,
            %tier,
            "Login scored"
        );

        RiskAssessment {
            tier,
            score,
            anomaly_score,
            recommended_timeout_secs: tier.timeout_secs(),
            rationale: tier.rationale().to_string(),
            insights: self.insights(attempt),
        }
    }

    /// Describe the attributes of an attempt whose recorded weight is negative.
    ///
    /// A device or network never observed has no recorded weight and is not
    /// flagged here; it only lowers the anomaly score.
    pub fn insights(&self, attempt: &LoginAttempt) -> Vec<String> {
        let (hour, day) = hour_and_weekday(attempt.timestamp, self.tz);
        let w = &self.weights;
        let mut insights = Vec::new();

        if w.hour_weight(hour) < 0.0 {
            insights.push(format!("Unusual login time ({hour}:00)"));
        }
        if w.day_weight(day) < 0.0 {
            insights.push(format!("Uncommon login day ({})", WEEKDAY_NAMES[day]));
        }
        if w.recorded_device_weight(&attempt.client.device) < 0.0 {
            insights.push("New or unusual device detected".to_string());
        }
        if w.recorded_location_weight(&attempt.client.network) < 0.0 {
            insights.push("Login from new location".to_string());
        }

        insights
    }

    /// Fold a logged login event into the weights.
    pub fn train(&mut self, event: &LoginEvent) {
        self.weights.train(event, self.tz);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::ClientInfo;
    use chrono::{DateTime, TimeZone, Utc};

    // 2025-01-06 was a Monday.
    fn monday_nine() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap()
    }

    fn attempt(at: DateTime<Utc>) -> LoginAttempt {
        LoginAttempt {
            badge_id: "badge001".to_string(),
            timestamp: at,
            client: ClientInfo::new("kiosk", "10.0.0.1"),
        }
    }

    fn event(at: DateTime<Utc>, success: bool) -> LoginEvent {
        LoginEvent::new(
            "badge001",
            success,
            "Successful login",
            RiskTier::Low,
            &ClientInfo::new("kiosk", "10.0.0.1"),
            at,
            Tz::UTC,
        )
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_fresh_model_scores_high_risk() {
        let scorer = RiskScorer::new(RiskWeights::default(), Tz::UTC);
        let a = attempt(monday_nine());

        // (2*0.3 + 2*0.2 + 1*0.3 + 1*0.2) / 4
        assert!(close(scorer.anomaly_score(&a), 0.375));

        let assessment = scorer.score(&a, 0.5);
        assert!(close(assessment.score, 0.375 * 0.7 + 0.15));
        assert_eq!(assessment.tier, RiskTier::High);
        assert_eq!(assessment.recommended_timeout_secs, 120);
        assert_eq!(
            assessment.rationale,
            "Significant deviation from normal behavior"
        );
        // Nothing recorded yet, so nothing is below zero.
        assert!(assessment.insights.is_empty());
    }

    #[test]
    fn test_familiar_login_scores_low_risk() {
        let mut scorer = RiskScorer::new(RiskWeights::default(), Tz::UTC);
        let e = event(monday_nine(), true);
        for _ in 0..3 {
            scorer.train(&e);
        }

        // (5*0.3 + 5*0.2 + 5*0.3 + 5*0.2) / 4 = 1.25
        let assessment = scorer.score(&attempt(monday_nine()), 0.5);
        assert!(close(assessment.anomaly_score, 1.25));
        assert_eq!(assessment.tier, RiskTier::Low);
        assert_eq!(assessment.recommended_timeout_secs, 360);
        assert!(assessment.insights.is_empty());
    }

    #[test]
    fn test_medium_tier() {
        let mut scorer = RiskScorer::new(RiskWeights::default(), Tz::UTC);
        scorer.train(&event(monday_nine(), true));

        // (3*0.3 + 3*0.2 + 3*0.3 + 3*0.2) / 4 = 0.75; 0.75*0.7 + 0.15 = 0.675
        let assessment = scorer.score(&attempt(monday_nine()), 0.5);
        assert_eq!(assessment.tier, RiskTier::Medium);
        assert_eq!(assessment.recommended_timeout_secs, 240);
    }

    #[test]
    fn test_profile_score_shifts_tier() {
        let mut scorer = RiskScorer::new(RiskWeights::default(), Tz::UTC);
        scorer.train(&event(monday_nine(), true));
        let a = attempt(monday_nine());

        // 0.525 + 0.3 = 0.825
        assert_eq!(scorer.score(&a, 1.0).tier, RiskTier::Low);
        // 0.525 + 0.0
        assert_eq!(scorer.score(&a, 0.0).tier, RiskTier::Medium);
    }

    #[test]
    fn test_insights_for_failures() {
        let mut scorer = RiskScorer::new(RiskWeights::default(), Tz::UTC);
        scorer.train(&event(monday_nine(), false));

        let insights = scorer.insights(&attempt(monday_nine()));
        assert_eq!(
            insights,
            vec![
                "Unusual login time (9:00)",
                "Uncommon login day (Mon)",
                "New or unusual device detected",
                "Login from new location",
            ]
        );
    }

    #[test]
    fn test_only_failed_devices_flagged() {
        let mut scorer = RiskScorer::new(RiskWeights::default(), Tz::UTC);
        scorer.train(&event(monday_nine(), true));
        let failed = LoginEvent::new(
            "badge001",
            false,
            "Failed login attempt",
            RiskTier::Low,
            &ClientInfo::new("laptop", "10.9.9.9"),
            monday_nine(),
            Tz::UTC,
        );
        scorer.train(&failed);

        let from_laptop = LoginAttempt {
            badge_id: "badge001".to_string(),
            timestamp: monday_nine(),
            client: ClientInfo::new("laptop", "10.9.9.9"),
        };
        assert_eq!(
            scorer.insights(&from_laptop),
            vec!["New or unusual device detected", "Login from new location"]
        );

        let from_phone = LoginAttempt {
            badge_id: "badge001".to_string(),
            timestamp: monday_nine(),
            client: ClientInfo::new("phone", "172.16.0.2"),
        };
        assert!(scorer.insights(&from_phone).is_empty());
        // The anomaly score still treats the unseen phone as suspicious.
        assert!(scorer.anomaly_score(&from_phone) < scorer.anomaly_score(&attempt(monday_nine())));
    }

    #[test]
    fn test_zero_weight_device_not_flagged() {
        let mut scorer = RiskScorer::new(RiskWeights::default(), Tz::UTC);
        // +1 then -0.5 twice leaves the device at exactly zero.
        scorer.train(&event(monday_nine(), true));
        scorer.train(&event(monday_nine(), false));
        scorer.train(&event(monday_nine(), false));

        let insights = scorer.insights(&attempt(monday_nine()));
        assert!(insights.is_empty(), "{insights:?}");
    }

    #[test]
    fn test_duplicate_training_double_counts() {
        let mut once = RiskScorer::new(RiskWeights::default(), Tz::UTC);
        let mut twice = RiskScorer::new(RiskWeights::default(), Tz::UTC);
        let e = event(monday_nine(), true);

        once.train(&e);
        twice.train(&e);
        twice.train(&e);

        assert_eq!(once.weights().hour_weight(9), 1.0);
        assert_eq!(twice.weights().hour_weight(9), 2.0);
        assert!(twice.anomaly_score(&attempt(monday_nine())) > once.anomaly_score(&attempt(monday_nine())));
    }

    #[test]
    fn test_scoring_uses_configured_time_zone() {
        let mut scorer = RiskScorer::new(RiskWeights::default(), chrono_tz::America::New_York);
        // 14:00 UTC is 09:00 in New York in January.
        scorer.train(&event(Utc.with_ymd_and_hms(2025, 1, 6, 14, 0, 0).unwrap(), false));
        let insights = scorer.insights(&attempt(Utc.with_ymd_and_hms(2025, 1, 13, 14, 0, 0).unwrap()));
        assert!(insights.contains(&"Unusual login time (9:00)".to_string()));
    }
}
