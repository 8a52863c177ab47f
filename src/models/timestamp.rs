//! Timestamp parsing and the window validations applied before any I/O.
//!
//! Instants crossing component boundaries are always `DateTime<Utc>`; the
//! only place a foreign offset can appear is user input, which
//! [`validate_utc`] rejects.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

use crate::errors::{RecorderError, RecorderResult};

/// Layout accepted by `--start` and `--finish`, e.g. `2024-02-01 00:00:00.000 UTC`.
///
/// The milliseconds are mandatory: a literal dot followed by exactly three digits.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S.%3f UTC";

/// Days of logs the managed service keeps around.
pub const DAYS_LOG_RETENTION: i64 = 7;

/// Parse a `--start`/`--finish` value. Empty input is "no instant", not an error.
pub fn parse_timestamp(input: &str) -> RecorderResult<Option<DateTime<Utc>>> {
    if input.is_empty() {
        return Ok(None);
    }

    NaiveDateTime::parse_from_str(input, TIMESTAMP_FORMAT)
        .map(|naive| Some(naive.and_utc()))
        .map_err(|err| RecorderError::InvalidTimestamp {
            input: input.to_string(),
            reason: err.to_string(),
        })
}

/// Render an instant in the same layout the CLI accepts.
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// Inclusive membership of `t` in the range spanned by `a` and `b`, in either order.
pub fn time_between(t: DateTime<Utc>, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    let (min, max) = if a > b { (b, a) } else { (a, b) };
    t >= min && t <= max
}

pub fn validate_interval(start: DateTime<Utc>, finish: DateTime<Utc>) -> RecorderResult<()> {
    if start > finish {
        return Err(RecorderError::StartAfterFinish {
            start: format_timestamp(&start),
            finish: format_timestamp(&finish),
        });
    }
    Ok(())
}

/// Reject a start older than the source's log retention.
pub fn validate_7_days(start: DateTime<Utc>) -> RecorderResult<()> {
    validate_7_days_at(start, Utc::now())
}

pub(crate) fn validate_7_days_at(start: DateTime<Utc>, now: DateTime<Utc>) -> RecorderResult<()> {
    let limit = now - Duration::days(DAYS_LOG_RETENTION);
    if start >= limit {
        return Ok(());
    }
    Err(RecorderError::OutsideRetention {
        start: format_timestamp(&start),
        limit: format_timestamp(&limit),
    })
}

/// Reject the first instant whose zone offset is not zero.
pub fn validate_utc<Tz: TimeZone>(instants: &[DateTime<Tz>]) -> RecorderResult<()> {
    use chrono::Offset;

    for instant in instants {
        if instant.offset().fix().local_minus_utc() != 0 {
            return Err(RecorderError::NotUtc(instant.to_rfc3339()));
        }
    }
    Ok(())
}

/// Zero the minutes, seconds and sub-seconds of an instant.
pub fn truncate_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    use chrono::Timelike;

    t.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}
