//! Wall-clock time utilities for boardkeeper
//!
//! Rental deadlines are wall-clock instants shown to administrators, so the
//! whole service works in `DateTime<Local>`.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `BOARDKEEPER_MOCK_TIME` environment variable shifts
//! the clock returned by [`now`]. The mocked clock keeps advancing at the
//! real rate from the given starting point.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-07-12 09:55:00`)

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "BOARDKEEPER_MOCK_TIME";

/// Format used in chat replies
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Format used for rows written to the mirror
pub const MIRROR_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            let raw = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
            let parsed = NaiveDateTime::parse_from_str(&raw, MIRROR_FORMAT)
                .ok()
                .and_then(|naive| Local.from_local_datetime(&naive).single());

            match parsed {
                Some(mock_dt) => {
                    let offset = mock_dt.signed_duration_since(Local::now());
                    tracing::info!(
                        mock_time = %raw,
                        offset_secs = offset.num_seconds(),
                        "Mock time enabled"
                    );
                    Some(offset)
                }
                None => {
                    tracing::warn!(
                        mock_time = %raw,
                        expected_format = MIRROR_FORMAT,
                        "Invalid mock time, using system clock"
                    );
                    None
                }
            }
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Current local time, respecting `BOARDKEEPER_MOCK_TIME` in debug builds.
pub fn now() -> DateTime<Local> {
    let real_now = Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Format a timestamp for chat display (`2025-07-12 14:30`).
pub fn format_display(dt: &DateTime<Local>) -> String {
    dt.format(DISPLAY_FORMAT).to_string()
}

/// Format a timestamp for the mirror (`2025-07-12 14:30:00`).
pub fn format_mirror(dt: &DateTime<Local>) -> String {
    dt.format(MIRROR_FORMAT).to_string()
}

/// Convert a fractional number of hours into a chrono duration with
/// millisecond precision.
pub fn hours_to_duration(hours: f64) -> chrono::Duration {
    chrono::Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}

/// Time left until `deadline`, or zero if it has already passed.
pub fn saturating_until(deadline: DateTime<Local>, now: DateTime<Local>) -> Duration {
    deadline
        .signed_duration_since(now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hours_convert_exactly() {
        assert_eq!(hours_to_duration(2.0), chrono::Duration::hours(2));
        assert_eq!(hours_to_duration(0.5), chrono::Duration::minutes(30));
        assert_eq!(hours_to_duration(1.25), chrono::Duration::minutes(75));
    }

    #[test]
    fn saturating_until_clamps_past_deadlines() {
        let now = Local.with_ymd_and_hms(2025, 7, 12, 12, 0, 0).unwrap();
        let later = now + chrono::Duration::minutes(10);

        assert_eq!(saturating_until(later, now), Duration::from_secs(600));
        assert_eq!(saturating_until(now, later), Duration::ZERO);
    }

    #[test]
    fn display_formats() {
        let dt = Local.with_ymd_and_hms(2025, 7, 12, 9, 5, 7).unwrap();
        assert_eq!(format_display(&dt), "2025-07-12 09:05");
        assert_eq!(format_mirror(&dt), "2025-07-12 09:05:07");
    }
}
