//! Calendar-day boundaries as experienced in a user's timezone.
//!
//! Every function here is pure. Timezone names that fail to parse degrade to UTC
//! with a warning instead of failing the caller.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{HorizonError, Result};

/// Inclusive UTC instant range covering one or more local calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBounds {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayBounds {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }
}

/// Strict parse of an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| HorizonError::InvalidTimezone(name.to_string()))
}

/// Parse an IANA timezone name, substituting UTC when it is unknown.
pub fn resolve_timezone(name: &str) -> Tz {
    match parse_timezone(name) {
        Ok(tz) => tz,
        Err(err) => {
            tracing::warn!(timezone = name, error = %err, "falling back to UTC");
            Tz::UTC
        }
    }
}

/// Calendar date of `instant` in `tz`.
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// First UTC instant whose local date in `tz` is `date`.
pub fn start_of_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => first_instant_after_gap(midnight, tz),
    }
}

// Midnight falls inside a DST gap; the day starts at the first wall-clock minute that exists.
fn first_instant_after_gap(midnight: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    for minutes in 1..=24 * 60 {
        let candidate = midnight + Duration::minutes(minutes);
        if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
            return dt.with_timezone(&Utc);
        }
    }
    Utc.from_utc_datetime(&midnight)
}

/// UTC bounds of `date` (00:00:00.000 through 23:59:59.999 local) in `tz`.
pub fn day_bounds_in(date: NaiveDate, tz: Tz) -> DayBounds {
    let start = start_of_day(date, tz);
    let next = date.succ_opt().unwrap_or(date);
    let end = if next == date {
        start + Duration::days(1) - Duration::milliseconds(1)
    } else {
        start_of_day(next, tz) - Duration::milliseconds(1)
    };
    DayBounds { start, end }
}

/// UTC bounds of `date` as experienced in the named timezone.
pub fn day_bounds(date: NaiveDate, timezone: &str) -> DayBounds {
    day_bounds_in(date, resolve_timezone(timezone))
}

/// UTC bounds of the local day containing `instant`.
pub fn day_bounds_at(instant: DateTime<Utc>, timezone: &str) -> DayBounds {
    let tz = resolve_timezone(timezone);
    day_bounds_in(local_date(instant, tz), tz)
}

/// From today's local midnight through the end of the day `days` ahead.
pub fn upcoming_range(now: DateTime<Utc>, timezone: &str, days: u32) -> DayBounds {
    let tz = resolve_timezone(timezone);
    upcoming_range_in(now, tz, days)
}

pub fn upcoming_range_in(now: DateTime<Utc>, tz: Tz, days: u32) -> DayBounds {
    let today = local_date(now, tz);
    let last = today + Duration::days(i64::from(days));
    DayBounds {
        start: start_of_day(today, tz),
        end: day_bounds_in(last, tz).end,
    }
}

/// The `count` local days ending today, oldest first.
pub fn trailing_days(now: DateTime<Utc>, tz: Tz, count: u32) -> Vec<NaiveDate> {
    let today = local_date(now, tz);
    (0..i64::from(count))
        .rev()
        .map(|back| today - Duration::days(back))
        .collect()
}
