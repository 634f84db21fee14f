use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, TimeZone, Timelike};

use crate::error::{Result, SchedulerError};

/// Calendar format accepted for task timestamps, e.g. `20250601 09:00:00`.
pub const TIME_FORMAT: &str = "%Y%m%d %H:%M:%S";

/// Parse `input` as an absolute date-time in the fixed zone `tz`.
///
/// Strict: every field must be zero-padded to its full width, the single
/// space separator is required and leap seconds are refused.
pub fn parse_timestamp(input: &str, tz: FixedOffset) -> Result<DateTime<FixedOffset>> {
    let invalid = |reason: String| SchedulerError::InvalidTimestamp {
        input: input.to_string(),
        reason,
    };
    let naive =
        NaiveDateTime::parse_from_str(input, TIME_FORMAT).map_err(|e| invalid(e.to_string()))?;
    // chrono accepts short fields, extra whitespace and `:60`.
    if naive.nanosecond() >= 1_000_000_000 {
        return Err(invalid("leap seconds are not accepted".to_string()));
    }
    if naive.format(TIME_FORMAT).to_string() != input {
        return Err(invalid(format!("expected layout {TIME_FORMAT}")));
    }
    // A fixed offset has no gaps or folds, so this is always `Single`.
    tz.from_local_datetime(&naive)
        .single()
        .ok_or_else(|| SchedulerError::InvalidTimestamp {
            input: input.to_string(),
            reason: "not representable in the configured zone".to_string(),
        })
}

/// Build the trigger expression for `at`:
/// `sec min hour day-of-month month day-of-week`.
///
/// Seconds are pinned to zero and the weekday is a wildcard. There is no
/// year field, so the expression matches the same moment every year; the
/// manager disarms it after the first firing.
pub fn derive_expression<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    format!(
        "0 {} {} {} {} *",
        at.minute(),
        at.hour(),
        at.day(),
        at.month()
    )
}
