//! Date/time display helpers.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Default format for activity timestamps.
pub const DEFAULT_FORMAT: &str = "%Y/%m/%d %H:%M";

/// Format a UTC instant in the given time zone.
///
/// # Arguments
///
/// * `dt` - Instant in UTC
/// * `tz` - Display time zone
/// * `format` - Output format string (e.g., "%Y/%m/%d %H:%M")
pub fn format_local(dt: &DateTime<Utc>, tz: Tz, format: &str) -> String {
    dt.with_timezone(&tz).format(format).to_string()
}

/// Format a UTC instant with [`DEFAULT_FORMAT`].
pub fn format_local_default(dt: &DateTime<Utc>, tz: Tz) -> String {
    format_local(dt, tz, DEFAULT_FORMAT)
}

/// Format a countdown as `m:ss`, rounding partial seconds up.
pub fn format_countdown(remaining: std::time::Duration) -> String {
    let mut secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs += 1;
    }
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_format_local_utc() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(format_local_default(&dt, Tz::UTC), "2024/01/15 10:30");
    }

    #[test]
    fn test_format_local_tokyo() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(
            format_local_default(&dt, chrono_tz::Asia::Tokyo),
            "2024/01/15 19:30"
        );
    }

    #[test]
    fn test_format_local_custom() {
        let dt = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 0).unwrap();
        assert_eq!(format_local(&dt, Tz::UTC, "%H:%M"), "23:59");
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(Duration::from_secs(180)), "3:00");
        assert_eq!(format_countdown(Duration::from_secs(59)), "0:59");
        assert_eq!(format_countdown(Duration::from_millis(4_200)), "0:05");
        assert_eq!(format_countdown(Duration::ZERO), "0:00");
    }
}
