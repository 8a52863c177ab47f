//! Remote log file names and the object keys derived from them.
//!
//! A name such as `error/postgresql.log.2024-02-23-0830.csv` carries its own
//! canonical UTC instant; placement never consults the wall clock.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::errors::{RecorderError, RecorderResult};
use crate::models::run::RunHandle;

static LOG_DATETIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{4}-[0-9]{2}-[0-9]{2}-[0-9]{2,4}").expect("valid regex"));

static CSV_LOG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^.+\.csv").expect("valid regex"));

/// Only CSV-formatted logs are archived.
pub fn is_csv_log(name: &str) -> bool {
    CSV_LOG.is_match(name)
}

/// Extract the canonical instant from a log file name.
///
/// Exactly one `YYYY-MM-DD-HH[MM]` occurrence must be present; minutes
/// default to zero when the name only carries the hour.
pub fn find_datetime_from_log(name: &str) -> RecorderResult<DateTime<Utc>> {
    let not_found = || RecorderError::NoDateInFileName(name.to_string());

    let mut matches = LOG_DATETIME.find_iter(name);
    let found = matches.next().ok_or_else(not_found)?;
    if matches.next().is_some() {
        return Err(not_found());
    }

    let fields: Vec<&str> = found.as_str().split('-').collect();
    let [year, month, day, clock] = fields[..] else {
        return Err(not_found());
    };
    let year: i32 = year.parse().map_err(|_| not_found())?;
    let month: u32 = month.parse().map_err(|_| not_found())?;
    let day: u32 = day.parse().map_err(|_| not_found())?;
    let hour: u32 = clock[..2].parse().map_err(|_| not_found())?;
    let minute: u32 = match &clock[2..] {
        "" => 0,
        rest => rest.parse().map_err(|_| not_found())?,
    };

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(not_found)
}

/// Object name for a log file: `rds_log_{PID}_{unix_seconds}`.
pub fn format_file_name_for_s3(run: &RunHandle, log_file_name: &str) -> RecorderResult<String> {
    let instant = find_datetime_from_log(log_file_name)?;
    Ok(format!("rds_log_{}_{}", run.pid(), instant.timestamp()))
}

/// Join a run folder and an object name into a bucket key.
pub fn format_file_path(folder: &str, file_name: &str) -> String {
    format!("{}/{}", folder, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn extracts_hour_and_minutes() {
        let t = find_datetime_from_log("error/postgresql.log.2024-02-23-0830.csv").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 2, 23, 8, 30, 0).unwrap());
    }

    #[test]
    fn minutes_default_to_zero() {
        let t = find_datetime_from_log("error/postgresql.log.2024-02-23-17.csv").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 2, 23, 17, 0, 0).unwrap());
    }

    #[test]
    fn rejects_names_without_a_single_date() {
        for name in [
            "test-file",
            "error/postgresql.log.csv",
            "error/postgresql.log.2024-02-23-08.2024-02-23-09.csv",
            "error/postgresql.log.2024-13-40-08.csv",
            "error/postgresql.log.2024-02-23-2599.csv",
        ] {
            assert!(
                matches!(
                    find_datetime_from_log(name),
                    Err(RecorderError::NoDateInFileName(_))
                ),
                "{name}"
            );
        }
    }

    #[test]
    fn non_ascii_digits_are_not_a_date() {
        for name in [
            "error/postgresql.log.2024-02-23-\u{ff10}\u{ff18}.csv",
            "error/postgresql.log.\u{0662}\u{0660}\u{0662}\u{0664}-02-23-08.csv",
        ] {
            assert!(
                matches!(
                    find_datetime_from_log(name),
                    Err(RecorderError::NoDateInFileName(_))
                ),
                "{name}"
            );
        }
    }

    #[test]
    fn csv_filter() {
        assert!(is_csv_log("error/postgresql.log.2024-02-23-0830.csv"));
        assert!(!is_csv_log("error/postgresql.log.2024-02-23-0830"));
        assert!(!is_csv_log(".csv"));
    }

    #[test]
    fn object_name_uses_pid_and_unix_seconds() {
        let run = RunHandle::with_pid("A1234ASDF", false);
        let name = format_file_name_for_s3(&run, "error/postgresql.log.2024-02-23-0830.csv").unwrap();
        assert_eq!(name, "rds_log_A1234ASDF_1708677000");
        assert_eq!(
            format_file_path(run.pid(), &name),
            "A1234ASDF/rds_log_A1234ASDF_1708677000"
        );
    }
}
