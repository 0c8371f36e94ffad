//! Test helpers for E2E tests.
//!
//! Provides a recording code delivery, a simulated clock and gate builders.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use badgegate::{
    ClientInfo, Config, Gate, MemoryStorage, OtpDelivery, RegistrationRequest, SimulatedClock,
    Storage, UserAccount,
};

/// Badge used by most scenarios.
pub const BADGE: &str = "badge001";

/// Password satisfying every strength criterion.
pub const PASSWORD: &str = "Str0ng!Pass";

/// One delivered code.
#[derive(Debug, Clone)]
pub struct Delivered {
    pub badge_id: String,
    pub code: String,
    pub destination: String,
    pub expires_at: DateTime<Utc>,
}

/// Delivery that keeps every code it is handed.
#[derive(Clone, Default)]
pub struct RecordingDelivery {
    sent: Arc<Mutex<Vec<Delivered>>>,
}

impl RecordingDelivery {
    /// Most recent code.
    pub fn last_code(&self) -> String {
        self.sent
            .lock()
            .unwrap()
            .last()
            .expect("no code delivered")
            .code
            .clone()
    }

    /// Everything delivered so far.
    pub fn sent(&self) -> Vec<Delivered> {
        self.sent.lock().unwrap().clone()
    }
}

impl OtpDelivery for RecordingDelivery {
    fn deliver(
        &self,
        account: &UserAccount,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> badgegate::Result<()> {
        self.sent.lock().unwrap().push(Delivered {
            badge_id: account.badge_id.clone(),
            code: code.to_string(),
            destination: account.contact.clone(),
            expires_at,
        });
        Ok(())
    }
}

/// Configuration with a cheap password hash.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.argon2_memory_kib = 8;
    config.auth.argon2_iterations = 1;
    config.auth.argon2_parallelism = 1;
    config.storage.in_memory = true;
    config
}

/// Monday 2025-01-06 09:00 UTC.
pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap()
}

/// The kiosk every scenario logs in from.
pub fn kiosk() -> ClientInfo {
    ClientInfo::new("kiosk", "192.168.1.1")
}

/// A gate wired to test doubles.
pub struct TestGate {
    pub gate: Gate,
    pub delivery: RecordingDelivery,
    pub clock: SimulatedClock,
}

impl TestGate {
    /// Gate over fresh in-memory storage.
    pub fn new() -> Self {
        Self::with_storage(Box::new(MemoryStorage::new()))
    }

    /// Gate over the given storage.
    pub fn with_storage(storage: Box<dyn Storage>) -> Self {
        Self::with_storage_at(storage, monday_morning())
    }

    /// Gate over the given storage, clock starting at `start`.
    pub fn with_storage_at(storage: Box<dyn Storage>, start: DateTime<Utc>) -> Self {
        let clock = SimulatedClock::new(start);
        let delivery = RecordingDelivery::default();
        let gate = Gate::open(&test_config(), storage)
            .expect("open gate")
            .with_clock(Arc::new(clock.clone()))
            .with_delivery(Box::new(delivery.clone()));
        Self {
            gate,
            delivery,
            clock,
        }
    }

    /// Register [`BADGE`] with [`PASSWORD`].
    pub fn register_default(&mut self) {
        self.gate
            .register(&RegistrationRequest::new(BADGE, PASSWORD, PASSWORD), &kiosk())
            .expect("register");
    }

    /// A code guaranteed to differ from the pending one.
    pub fn wrong_code(&self) -> &'static str {
        if self.delivery.last_code() == "123456" {
            "654321"
        } else {
            "123456"
        }
    }
}
