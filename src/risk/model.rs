//! Weighted login histograms.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::audit::LoginEvent;
use crate::storage::{load_json, save_json, Collection, Storage};
use crate::Result;

/// Weight added per successful login.
pub const SUCCESS_DELTA: f64 = 1.0;

/// Weight added per failed login.
pub const FAILURE_DELTA: f64 = -0.5;

/// Weight assumed for a device or network never observed.
pub const UNSEEN_WEIGHT: f64 = -1.0;

/// Hour (0-23) and weekday (Sunday = 0) of an instant in a time zone.
pub(crate) fn hour_and_weekday(timestamp: DateTime<Utc>, tz: Tz) -> (usize, usize) {
    let local = timestamp.with_timezone(&tz);
    (
        local.hour() as usize,
        local.weekday().num_days_from_sunday() as usize,
    )
}

/// Histograms of observed login outcomes.
///
/// Weights accumulate without decay or clamping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    /// One bucket per hour of day.
    pub time_weights: [f64; 24],
    /// One bucket per weekday, Sunday first.
    pub day_weights: [f64; 7],
    /// Per device string.
    pub device_weights: BTreeMap<String, f64>,
    /// Per network address.
    pub location_weights: BTreeMap<String, f64>,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            time_weights: [0.0; 24],
            day_weights: [0.0; 7],
            device_weights: BTreeMap::new(),
            location_weights: BTreeMap::new(),
        }
    }
}

impl RiskWeights {
    /// Load the model from storage.
    pub fn load(storage: &dyn Storage) -> Result<Self> {
        load_json(storage, Collection::RiskModel)
    }

    /// Persist the model.
    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        save_json(storage, Collection::RiskModel, self)
    }

    /// Fold one login event into the histograms.
    pub fn train(&mut self, event: &LoginEvent, tz: Tz) {
        let delta = if event.success {
            SUCCESS_DELTA
        } else {
            FAILURE_DELTA
        };
        let (hour, day) = hour_and_weekday(event.timestamp, tz);

        self.time_weights[hour] += delta;
        self.day_weights[day] += delta;
        *self
            .device_weights
            .entry(event.user_agent.clone())
            .or_insert(0.0) += delta;
        *self
            .location_weights
            .entry(event.ip_address.clone())
            .or_insert(0.0) += delta;
    }

    /// Weight of an hour bucket.
    pub fn hour_weight(&self, hour: usize) -> f64 {
        self.time_weights[hour % 24]
    }

    /// Weight of a weekday bucket (Sunday = 0).
    pub fn day_weight(&self, day: usize) -> f64 {
        self.day_weights[day % 7]
    }

    /// Weight of a device, [`UNSEEN_WEIGHT`] if never observed.
    pub fn device_weight(&self, device: &str) -> f64 {
        self.device_weights
            .get(device)
            .copied()
            .unwrap_or(UNSEEN_WEIGHT)
    }

    /// Weight of a network, [`UNSEEN_WEIGHT`] if never observed.
    pub fn location_weight(&self, network: &str) -> f64 {
        self.location_weights
            .get(network)
            .copied()
            .unwrap_or(UNSEEN_WEIGHT)
    }

    /// Accumulated weight of a device, zero if never observed.
    pub fn recorded_device_weight(&self, device: &str) -> f64 {
        self.device_weights.get(device).copied().unwrap_or(0.0)
    }

    /// Accumulated weight of a network, zero if never observed.
    pub fn recorded_location_weight(&self, network: &str) -> f64 {
        self.location_weights.get(network).copied().unwrap_or(0.0)
    }
}
