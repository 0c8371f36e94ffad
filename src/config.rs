//! Configuration module for badgegate.

use serde::Deserialize;
use std::path::Path;

use chrono_tz::Tz;

use crate::auth::HashCost;
use crate::{BadgeGateError, Result};

/// Longest accepted code lifetime or resend cooldown (one day).
pub const MAX_COUNTDOWN_SECS: u64 = 86_400;

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of a one-time code in seconds.
    #[serde(default = "default_otp_ttl")]
    pub otp_ttl_secs: u64,
    /// Wrong submissions allowed before a challenge is blocked.
    #[serde(default = "default_otp_max_attempts")]
    pub otp_max_attempts: u32,
    /// Seconds a user must wait before requesting a new code.
    #[serde(default = "default_resend_cooldown")]
    pub resend_cooldown_secs: u64,
    /// Argon2 memory cost in KiB.
    #[serde(default = "default_argon2_memory")]
    pub argon2_memory_kib: u32,
    /// Argon2 iteration count.
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,
    /// Argon2 lanes.
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,
}

fn default_otp_ttl() -> u64 {
    180
}

fn default_otp_max_attempts() -> u32 {
    3
}

fn default_resend_cooldown() -> u64 {
    60
}

fn default_argon2_memory() -> u32 {
    65536
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

impl AuthConfig {
    /// Hashing cost described by this configuration.
    pub fn hash_cost(&self) -> HashCost {
        HashCost {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            otp_ttl_secs: default_otp_ttl(),
            otp_max_attempts: default_otp_max_attempts(),
            resend_cooldown_secs: default_resend_cooldown(),
            argon2_memory_kib: default_argon2_memory(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
        }
    }
}

/// Risk scoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// Time zone used to bucket logins by hour and weekday (e.g. "UTC", "Asia/Tokyo").
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl RiskConfig {
    /// Parse the configured time zone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|_| BadgeGateError::Validation(format!("unknown time zone: {}", self.timezone)))
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the JSON collections.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Keep everything in memory and never touch the disk.
    #[serde(default)]
    pub in_memory: bool,
}

fn default_data_dir() -> String {
    "data".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            in_memory: false,
        }
    }
}

/// Client attributes reported for logins from this process.
///
/// The network address is a placeholder; a real deployment supplies the
/// peer address of the connection.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Device string recorded with every login.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Network address recorded with every login.
    #[serde(default = "default_network_address")]
    pub network_address: String,
}

fn default_user_agent() -> String {
    format!("badgegate-console/{}", env!("CARGO_PKG_VERSION"))
}

fn default_network_address() -> String {
    "192.168.1.1".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            network_address: default_network_address(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/badgegate.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Risk scoring configuration.
    #[serde(default)]
    pub risk: RiskConfig,
    /// Persistence configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Client attributes.
    #[serde(default)]
    pub client: ClientConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(BadgeGateError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| BadgeGateError::Validation(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `BADGEGATE_DATA_DIR`: Override the storage directory
    pub fn apply_env_overrides(&mut self) {
        if let Ok(data_dir) = std::env::var("BADGEGATE_DATA_DIR") {
            if !data_dir.is_empty() {
                self.storage.data_dir = data_dir;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - The risk time zone is unknown
    /// - No OTP attempt is allowed, or codes expire immediately
    /// - The code lifetime or resend cooldown exceeds [`MAX_COUNTDOWN_SECS`]
    /// - The Argon2 parameters are rejected by the hasher
    pub fn validate(&self) -> Result<()> {
        self.risk.tz()?;
        if self.auth.otp_max_attempts == 0 {
            return Err(BadgeGateError::Validation(
                "auth.otp_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.auth.otp_ttl_secs == 0 {
            return Err(BadgeGateError::Validation(
                "auth.otp_ttl_secs must be greater than 0".to_string(),
            ));
        }
        if self.auth.otp_ttl_secs > MAX_COUNTDOWN_SECS {
            return Err(BadgeGateError::Validation(format!(
                "auth.otp_ttl_secs must be at most {MAX_COUNTDOWN_SECS}"
            )));
        }
        if self.auth.resend_cooldown_secs > MAX_COUNTDOWN_SECS {
            return Err(BadgeGateError::Validation(format!(
                "auth.resend_cooldown_secs must be at most {MAX_COUNTDOWN_SECS}"
            )));
        }
        self.auth.hash_cost().params()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.auth.otp_ttl_secs, 180);
        assert_eq!(config.auth.otp_max_attempts, 3);
        assert_eq!(config.auth.resend_cooldown_secs, 60);
        assert_eq!(config.auth.argon2_memory_kib, 65536);
        assert_eq!(config.auth.argon2_iterations, 3);
        assert_eq!(config.auth.argon2_parallelism, 4);

        assert_eq!(config.risk.timezone, "UTC");

        assert_eq!(config.storage.data_dir, "data");
        assert!(!config.storage.in_memory);

        assert!(config.client.user_agent.starts_with("badgegate-console/"));
        assert_eq!(config.client.network_address, "192.168.1.1");

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/badgegate.log");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[auth]
otp_ttl_secs = 300
otp_max_attempts = 5
resend_cooldown_secs = 30
argon2_memory_kib = 19456
argon2_iterations = 2
argon2_parallelism = 1

[risk]
timezone = "Asia/Tokyo"

[storage]
data_dir = "custom/data"
in_memory = true

[client]
user_agent = "kiosk-7"
network_address = "10.0.0.7"

[logging]
level = "debug"
file = "custom/logs/app.log"
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.auth.otp_ttl_secs, 300);
        assert_eq!(config.auth.otp_max_attempts, 5);
        assert_eq!(config.auth.resend_cooldown_secs, 30);
        assert_eq!(config.auth.argon2_memory_kib, 19456);
        assert_eq!(config.auth.argon2_iterations, 2);
        assert_eq!(config.auth.argon2_parallelism, 1);

        assert_eq!(config.risk.timezone, "Asia/Tokyo");
        assert_eq!(config.risk.tz().unwrap(), chrono_tz::Asia::Tokyo);

        assert_eq!(config.storage.data_dir, "custom/data");
        assert!(config.storage.in_memory);

        assert_eq!(config.client.user_agent, "kiosk-7");
        assert_eq!(config.client.network_address, "10.0.0.7");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, "custom/logs/app.log");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[auth]
otp_ttl_secs = 60
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.auth.otp_ttl_secs, 60);
        assert_eq!(config.auth.otp_max_attempts, 3);
        assert_eq!(config.risk.timezone, "UTC");
        assert_eq!(config.storage.data_dir, "data");
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();

        assert_eq!(config.auth.otp_ttl_secs, 180);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");

        assert!(result.is_err());
        if let Err(BadgeGateError::Validation(msg)) = result {
            assert!(msg.contains("config parse error"));
        } else {
            panic!("Expected Validation error");
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");

        assert!(result.is_err());
        assert!(matches!(result, Err(BadgeGateError::Io(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[risk]\ntimezone = \"Europe/Berlin\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.risk.timezone, "Europe/Berlin");
    }

    #[test]
    fn test_apply_env_overrides() {
        let original = std::env::var("BADGEGATE_DATA_DIR").ok();

        std::env::set_var("BADGEGATE_DATA_DIR", "/tmp/badgegate-env");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.storage.data_dir, "/tmp/badgegate-env");

        std::env::set_var("BADGEGATE_DATA_DIR", "");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.storage.data_dir, "data");

        if let Some(val) = original {
            std::env::set_var("BADGEGATE_DATA_DIR", val);
        } else {
            std::env::remove_var("BADGEGATE_DATA_DIR");
        }
    }

    #[test]
    fn test_validate_default() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_unknown_timezone() {
        let mut config = Config::default();
        config.risk.timezone = "Mars/Olympus_Mons".to_string();

        let result = config.validate();
        assert!(result.is_err());
        if let Err(BadgeGateError::Validation(msg)) = result {
            assert!(msg.contains("Mars/Olympus_Mons"));
        }
    }

    #[test]
    fn test_validate_zero_attempts() {
        let mut config = Config::default();
        config.auth.otp_max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ttl_upper_bound() {
        let mut config = Config::default();
        config.auth.otp_ttl_secs = MAX_COUNTDOWN_SECS;
        assert!(config.validate().is_ok());

        config.auth.otp_ttl_secs = 100_000_000_000_000;
        let result = config.validate();
        assert!(matches!(result, Err(BadgeGateError::Validation(ref msg)) if msg.contains("otp_ttl_secs")));
    }

    #[test]
    fn test_validate_cooldown_upper_bound() {
        let mut config = Config::default();
        config.auth.resend_cooldown_secs = 0;
        assert!(config.validate().is_ok());

        config.auth.resend_cooldown_secs = MAX_COUNTDOWN_SECS + 1;
        let result = config.validate();
        assert!(matches!(result, Err(BadgeGateError::Validation(ref msg)) if msg.contains("resend_cooldown_secs")));
    }

    #[test]
    fn test_validate_bad_argon2_params() {
        let mut config = Config::default();
        config.auth.argon2_parallelism = 0;
        assert!(config.validate().is_err());
    }
}
