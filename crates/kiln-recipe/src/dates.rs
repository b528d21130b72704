//! Timestamps and frequencies as written in recipes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::number;

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;

/// Largest integer frequency, in hours, that fits a [`TimeDelta`].
pub const MAX_FREQUENCY_HOURS: i64 = i64::MAX / 1_000 / SECONDS_PER_HOUR;

/// Naive datetime layouts accepted in addition to RFC 3339.
const DATETIME_LAYOUTS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("cannot parse '{0}' as a date or datetime")]
    InvalidDatetime(String),

    #[error("cannot convert frequency '{0}' to a duration")]
    InvalidFrequency(String),

    #[error("frequency must be positive, got '{0}'")]
    NonPositiveFrequency(String),

    #[error("interval is missing '{0}'")]
    IncompleteInterval(&'static str),

    #[error("interval end {end} is before start {start}")]
    EndBeforeStart { start: Timestamp, end: Timestamp },
}

/// Parse a recipe timestamp.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD[T ]HH:MM[:SS[.f]]` and RFC 3339 with an
/// offset, which is converted to UTC.
pub fn parse_datetime(input: &str) -> Result<NaiveDateTime, DateError> {
    let s = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }
    for layout in DATETIME_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, layout) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }

    Err(DateError::InvalidDatetime(input.to_string()))
}

/// A point in time, always naive UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(pub NaiveDateTime);

impl Timestamp {
    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }

    pub fn checked_add(&self, frequency: Frequency) -> Option<Timestamp> {
        self.0.checked_add_signed(frequency.0).map(Timestamp)
    }
}

impl FromStr for Timestamp {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_datetime(s).map(Timestamp)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.nanosecond() == 0 {
            write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S"))
        } else {
            write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S%.f"))
        }
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(dt: NaiveDateTime) -> Self {
        Timestamp(dt)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Step between consecutive dates of an interval.
///
/// Parsed from an integer number of hours, `"<n>h"`, `"<n>d"`, `"<n>m"`,
/// `"<n>s"`, `"HH:MM"`, `"HH:MM:SS"` or an ISO 8601 duration without years
/// or months (`"PT6H"`, `"P1D"`, `"P1W"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Frequency(TimeDelta);

impl Frequency {
    pub fn from_hours(hours: i64) -> Result<Self, DateError> {
        let delta = TimeDelta::try_hours(hours)
            .ok_or_else(|| DateError::InvalidFrequency(hours.to_string()))?;
        Self::positive(delta, || hours.to_string())
    }

    pub fn as_delta(&self) -> TimeDelta {
        self.0
    }

    pub fn num_seconds(&self) -> i64 {
        self.0.num_seconds()
    }

    fn positive(delta: TimeDelta, raw: impl FnOnce() -> String) -> Result<Self, DateError> {
        if delta <= TimeDelta::zero() {
            return Err(DateError::NonPositiveFrequency(raw()));
        }
        Ok(Frequency(delta))
    }
}

impl FromStr for Frequency {
    type Err = DateError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let s = input.trim();
        let invalid = || DateError::InvalidFrequency(input.to_string());

        if let Ok(hours) = s.parse::<i64>() {
            return Frequency::from_hours(hours);
        }

        let seconds = if let Some(seconds) = parse_unit_suffix(s) {
            seconds
        } else if s.contains(':') {
            parse_clock(s).ok_or_else(invalid)?
        } else if s.starts_with(['P', 'p']) {
            parse_iso8601(s).ok_or_else(invalid)?
        } else {
            return Err(invalid());
        };

        let delta = TimeDelta::try_seconds(seconds).ok_or_else(invalid)?;
        Frequency::positive(delta, || input.to_string())
    }
}

/// `"6h"`, `"1D"`, `"30m"`, `"10s"`.
fn parse_unit_suffix(s: &str) -> Option<i64> {
    let unit = s.chars().last()?;
    let digits = &s[..s.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let multiplier = match unit.to_ascii_lowercase() {
        'd' => SECONDS_PER_DAY,
        'h' => SECONDS_PER_HOUR,
        'm' => SECONDS_PER_MINUTE,
        's' => 1,
        _ => return None,
    };
    digits.parse::<i64>().ok()?.checked_mul(multiplier)
}

/// `"HH:MM"` or `"HH:MM:SS"`. Minutes and seconds stay below 60.
fn parse_clock(s: &str) -> Option<i64> {
    let parts = s
        .split(':')
        .map(|p| {
            let p = p.trim();
            if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            p.parse::<i64>().ok()
        })
        .collect::<Option<Vec<_>>>()?;
    let (h, m, sec) = match parts.as_slice() {
        [h, m] => (*h, *m, 0),
        [h, m, sec] => (*h, *m, *sec),
        _ => return None,
    };
    if m >= 60 || sec >= 60 {
        return None;
    }
    h.checked_mul(SECONDS_PER_HOUR)?
        .checked_add(m.checked_mul(SECONDS_PER_MINUTE)?)?
        .checked_add(sec)
}

/// ISO 8601 durations with fixed-length units only.
fn parse_iso8601(s: &str) -> Option<i64> {
    let body = s.get(1..)?.to_ascii_uppercase();
    if body.is_empty() {
        return None;
    }

    let mut total: i64 = 0;
    let mut in_time = false;
    let mut number = String::new();
    let mut seen_component = false;

    for c in body.chars() {
        match c {
            '0'..='9' => number.push(c),
            'T' if !in_time && number.is_empty() => in_time = true,
            unit => {
                let value: i64 = number.parse().ok()?;
                number.clear();
                let multiplier = match (in_time, unit) {
                    (false, 'W') => 7 * SECONDS_PER_DAY,
                    (false, 'D') => SECONDS_PER_DAY,
                    (true, 'H') => SECONDS_PER_HOUR,
                    (true, 'M') => SECONDS_PER_MINUTE,
                    (true, 'S') => 1,
                    // Years and months have no fixed length.
                    _ => return None,
                };
                total = total.checked_add(value.checked_mul(multiplier)?)?;
                seen_component = true;
            }
        }
    }

    if !number.is_empty() || !seen_component {
        return None;
    }
    Some(total)
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.num_seconds();
        if seconds % SECONDS_PER_DAY == 0 {
            write!(f, "{}d", seconds / SECONDS_PER_DAY)
        } else if seconds % SECONDS_PER_HOUR == 0 {
            write!(f, "{}h", seconds / SECONDS_PER_HOUR)
        } else if seconds % SECONDS_PER_MINUTE == 0 {
            write!(f, "{}m", seconds / SECONDS_PER_MINUTE)
        } else {
            write!(f, "{}s", seconds)
        }
    }
}

impl Serialize for Frequency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Frequency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FrequencyVisitor;

        impl Visitor<'_> for FrequencyVisitor {
            type Value = Frequency;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number of hours or a duration string such as '6h'")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Frequency, E> {
                Frequency::from_hours(v).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Frequency, E> {
                let hours = i64::try_from(v).map_err(E::custom)?;
                Frequency::from_hours(hours).map_err(E::custom)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Frequency, E> {
                let hours = number::whole(v)
                    .ok_or_else(|| E::custom(DateError::InvalidFrequency(v.to_string())))?;
                Frequency::from_hours(hours).map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Frequency, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(FrequencyVisitor)
    }
}
