//! Scheduled-publish validation.
//!
//! A deferred post must go live between 10 minutes and 75 days from now.
//! The platform wants the instant as integer epoch seconds.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::domain::ScheduleWindow;

use super::error::ScheduleRejection;

/// Minimum lead time for a scheduled post
pub const MIN_LEAD_MINUTES: i64 = 10;

/// Maximum lead time for a scheduled post
pub const MAX_LEAD_DAYS: i64 = 75;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse a user-entered publish time.
///
/// Accepts RFC 3339, or a naive `YYYY-MM-DDTHH:MM[:SS]` /
/// `YYYY-MM-DD HH:MM[:SS]` value interpreted as UTC.
pub fn parse_schedule(input: &str) -> Result<DateTime<Utc>, ScheduleRejection> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ScheduleRejection::Unparsable {
            input: input.to_string(),
        })
}

/// Check that `instant` is inside the allowed window relative to `now`
pub fn validate_schedule(
    now: DateTime<Utc>,
    instant: DateTime<Utc>,
) -> Result<ScheduleWindow, ScheduleRejection> {
    if instant < now {
        return Err(ScheduleRejection::InPast);
    }

    if instant < now + Duration::minutes(MIN_LEAD_MINUTES) {
        return Err(ScheduleRejection::TooSoon {
            min_minutes: MIN_LEAD_MINUTES,
        });
    }

    if instant > now + Duration::days(MAX_LEAD_DAYS) {
        return Err(ScheduleRejection::TooFar {
            max_days: MAX_LEAD_DAYS,
        });
    }

    // Re-check the integer form the platform will actually receive
    let timestamp = instant.timestamp();
    let now_seconds = now.timestamp();
    if timestamp <= now_seconds {
        return Err(ScheduleRejection::NotInFuture {
            timestamp,
            now: now_seconds,
        });
    }

    Ok(ScheduleWindow::new(instant, timestamp))
}

/// Parse then validate a user-entered publish time
pub fn validate_schedule_input(
    now: DateTime<Utc>,
    input: &str,
) -> Result<ScheduleWindow, ScheduleRejection> {
    validate_schedule(now, parse_schedule(input)?)
}
