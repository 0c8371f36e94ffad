//! Per-badge behavioral profiles.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::risk::ClientInfo;
use crate::storage::{load_json, save_json, Collection, Storage};
use crate::Result;

/// Profile score used for badges without a profile.
pub const DEFAULT_PROFILE_RISK: f64 = 0.5;

/// Score a profile starts from when it is created.
pub const INITIAL_PROFILE_RISK: f64 = 0.0;

/// Score lost per failed credential check.
const FAILURE_PENALTY: f64 = 0.15;

/// Login history of one badge.
///
/// `risk_score` is on the same scale as the anomaly score: higher means
/// more trustworthy, and it always stays within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Failed credential checks, ever.
    pub failed_attempts: u32,
    /// Failed credential checks since the last established session.
    pub consecutive_failures: u32,
    /// Established sessions.
    pub successful_logins: u32,
    /// Last established session.
    pub last_login: Option<DateTime<Utc>>,
    /// Devices sessions were established from.
    pub known_devices: Vec<String>,
    /// Networks sessions were established from.
    pub known_networks: Vec<String>,
    /// Stored score blended into every assessment.
    pub risk_score: f64,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            failed_attempts: 0,
            consecutive_failures: 0,
            successful_logins: 0,
            last_login: None,
            known_devices: Vec::new(),
            known_networks: Vec::new(),
            risk_score: INITIAL_PROFILE_RISK,
        }
    }
}

impl UserProfile {
    /// Profile for a badge registered from `client`.
    pub fn new(client: &ClientInfo) -> Self {
        Self {
            known_devices: vec![client.device.clone()],
            known_networks: vec![client.network.clone()],
            ..Self::default()
        }
    }

    /// Whether a device has been seen for this badge.
    pub fn knows_device(&self, device: &str) -> bool {
        self.known_devices.iter().any(|d| d == device)
    }

    /// Whether a network has been seen for this badge.
    pub fn knows_network(&self, network: &str) -> bool {
        self.known_networks.iter().any(|n| n == network)
    }

    fn record_failure(&mut self) {
        self.failed_attempts += 1;
        self.consecutive_failures += 1;
        self.risk_score = (self.risk_score - FAILURE_PENALTY).max(0.0);
    }

    fn record_success(&mut self, client: &ClientInfo, at: DateTime<Utc>) {
        self.consecutive_failures = 0;
        self.successful_logins += 1;
        self.last_login = Some(at);
        if !self.knows_device(&client.device) {
            self.known_devices.push(client.device.clone());
        }
        if !self.knows_network(&client.network) {
            self.known_networks.push(client.network.clone());
        }
    }
}

/// Profiles keyed by badge ID.
#[derive(Debug, Default)]
pub struct ProfileStore {
    profiles: BTreeMap<String, UserProfile>,
}

impl ProfileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load profiles from storage.
    pub fn load(storage: &dyn Storage) -> Result<Self> {
        let profiles: BTreeMap<String, UserProfile> = load_json(storage, Collection::Profiles)?;
        Ok(Self { profiles })
    }

    /// Persist profiles.
    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        save_json(storage, Collection::Profiles, &self.profiles)
    }

    /// Start a fresh profile for a badge, replacing any previous one.
    pub fn initialize(&mut self, badge_id: &str, client: &ClientInfo) {
        self.profiles
            .insert(badge_id.to_string(), UserProfile::new(client));
    }

    /// Record a failed credential check.
    pub fn record_failure(&mut self, badge_id: &str) {
        let profile = self.profiles.entry(badge_id.to_string()).or_default();
        profile.record_failure();
        debug!(
            badge_id = %badge_id,
            consecutive_failures = profile.consecutive_failures,
            risk_score = profile.risk_score,
            "Profile failure recorded"
        );
    }

    /// Record an established session.
    pub fn record_success(&mut self, badge_id: &str, client: &ClientInfo, at: DateTime<Utc>) {
        self.profiles
            .entry(badge_id.to_string())
            .or_default()
            .record_success(client, at);
    }

    /// The profile of a badge.
    pub fn get(&self, badge_id: &str) -> Option<&UserProfile> {
        self.profiles.get(badge_id)
    }

    /// Stored score of a badge, [`DEFAULT_PROFILE_RISK`] when unknown.
    pub fn risk_score(&self, badge_id: &str) -> f64 {
        self.profiles
            .get(badge_id)
            .map_or(DEFAULT_PROFILE_RISK, |p| p.risk_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn client() -> ClientInfo {
        ClientInfo::new("kiosk", "192.168.1.1")
    }

    #[test]
    fn test_unknown_badge_default_score() {
        let store = ProfileStore::new();
        assert_eq!(store.risk_score("badge001"), DEFAULT_PROFILE_RISK);
        assert!(store.get("badge001").is_none());
    }

    #[test]
    fn test_initialize_records_client() {
        let mut store = ProfileStore::new();
        store.initialize("badge001", &client());

        let profile = store.get("badge001").unwrap();
        assert!(profile.knows_device("kiosk"));
        assert!(profile.knows_network("192.168.1.1"));
        // A registered badge scores below one without any profile.
        assert_eq!(profile.risk_score, INITIAL_PROFILE_RISK);
        assert!(store.risk_score("badge001") < store.risk_score("badge002"));
    }

    #[test]
    fn test_failures_lower_score_to_floor() {
        let mut profile = UserProfile::new(&client());
        profile.risk_score = 0.5;

        profile.record_failure();
        assert_eq!(profile.failed_attempts, 1);
        assert_eq!(profile.consecutive_failures, 1);
        assert!((profile.risk_score - 0.35).abs() < 1e-9);

        for _ in 0..10 {
            profile.record_failure();
        }
        assert_eq!(profile.risk_score, 0.0);
        assert_eq!(profile.failed_attempts, 11);
    }

    #[test]
    fn test_store_failure_on_registered_badge() {
        let mut store = ProfileStore::new();
        store.initialize("badge001", &client());
        store.record_failure("badge001");

        let profile = store.get("badge001").unwrap();
        assert_eq!(profile.failed_attempts, 1);
        assert_eq!(profile.risk_score, 0.0);
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let mut store = ProfileStore::new();
        store.initialize("badge001", &client());
        store.record_failure("badge001");
        store.record_failure("badge001");

        let at = Utc::now();
        let laptop = ClientInfo::new("laptop", "10.1.1.1");
        store.record_success("badge001", &laptop, at);

        let profile = store.get("badge001").unwrap();
        assert_eq!(profile.consecutive_failures, 0);
        assert_eq!(profile.failed_attempts, 2);
        assert_eq!(profile.successful_logins, 1);
        assert_eq!(profile.last_login, Some(at));
        assert_eq!(profile.known_devices, vec!["kiosk", "laptop"]);
        assert_eq!(profile.known_networks, vec!["192.168.1.1", "10.1.1.1"]);
    }

    #[test]
    fn test_success_leaves_score_unchanged() {
        let mut store = ProfileStore::new();
        store.initialize("badge001", &client());
        for _ in 0..5 {
            store.record_success("badge001", &client(), Utc::now());
        }

        let profile = store.get("badge001").unwrap();
        assert_eq!(profile.risk_score, INITIAL_PROFILE_RISK);
        assert_eq!(profile.successful_logins, 5);
        // Known attributes are not duplicated.
        assert_eq!(profile.known_devices.len(), 1);
    }

    #[test]
    fn test_save_and_load() {
        let storage = MemoryStorage::new();
        let mut store = ProfileStore::new();
        store.initialize("badge001", &client());
        store.record_failure("badge001");
        store.save(&storage).unwrap();

        let loaded = ProfileStore::load(&storage).unwrap();
        assert_eq!(loaded.get("badge001"), store.get("badge001"));
    }
}
