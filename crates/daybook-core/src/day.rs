//! Day boundaries.
//!
//! A "day" starts at 07:00 local time, so late-night activity is grouped
//! with the evening before it. Every component that needs to know which
//! day an event belongs to goes through [`day_start`].

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Timelike};

use crate::error::{Error, Result};

/// Length of a day window in seconds.
pub const DAY_SECONDS: i64 = 86_400;

/// Local hour at which a new day begins.
pub const DAY_CUTOFF_HOUR: u32 = 7;

/// Start of the day `t` belongs to, in the machine's local timezone.
pub fn day_start(t: i64) -> Result<i64> {
    day_start_in(t, &Local)
}

/// Start of the day `t` belongs to, in an explicit timezone.
pub fn day_start_in<Tz: TimeZone>(t: i64, tz: &Tz) -> Result<i64> {
    if t < 0 {
        return Err(Error::InvalidTimestamp(t.to_string()));
    }
    let utc = DateTime::from_timestamp(t, 0)
        .ok_or_else(|| Error::InvalidTimestamp(t.to_string()))?;
    let local = utc.with_timezone(tz);

    let mut date = local.date_naive();
    if local.hour() < DAY_CUTOFF_HOUR {
        date = date
            .pred_opt()
            .ok_or_else(|| Error::InvalidTimestamp(t.to_string()))?;
    }

    cutoff_instant(date, tz).ok_or_else(|| Error::InvalidTimestamp(t.to_string()))
}

/// The cutoff instant on `date`. When 07:00 falls into a DST gap the first
/// valid local time after it is used.
fn cutoff_instant<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<i64> {
    let cutoff = date.and_hms_opt(DAY_CUTOFF_HOUR, 0, 0)?;
    (0..=3).find_map(|shift| {
        tz.from_local_datetime(&(cutoff + Duration::minutes(30 * shift)))
            .earliest()
            .map(|dt| dt.timestamp())
    })
}

/// End (exclusive) of the window starting at `day_t0`, saturating at
/// `i64::MAX`.
pub fn day_end(day_t0: i64) -> i64 {
    day_t0.saturating_add(DAY_SECONDS)
}

/// Whether `t` lies in `[day_t0, day_t0 + DAY_SECONDS)`.
pub fn in_day(day_t0: i64, t: i64) -> bool {
    t.checked_sub(day_t0)
        .is_some_and(|offset| (0..DAY_SECONDS).contains(&offset))
}

/// Parse a textual Unix timestamp.
///
/// Accepts integers and decimals; decimals are truncated toward zero.
pub fn parse_timestamp(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Ok(value);
    }
    let value: f64 = raw
        .parse()
        .map_err(|_| Error::InvalidTimestamp(raw.to_string()))?;
    if !value.is_finite() || value.abs() >= i64::MAX as f64 {
        return Err(Error::InvalidTimestamp(raw.to_string()));
    }
    Ok(value.trunc() as i64)
}

/// Current Unix time in seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
