//! Second-precision UTC timestamps and ranges.
//!
//! Both event streams exchange times as `"YYYY-MM-DD HH:MM:SS"` (UTC). The
//! newtype keeps that wire format in one place and gives correct ordering.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Wire format shared by failure and diagnostic timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A UTC instant truncated to whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Truncates sub-second precision.
    pub fn new(at: NaiveDateTime) -> Self {
        Self(at.with_nanosecond(0).unwrap_or(at))
    }

    /// Parse the exact wire format. Anything else is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
            .ok()
            .map(Self)
    }

    pub fn now() -> Self {
        Self::new(Utc::now().naive_utc())
    }

    /// Midnight at the start of `date`.
    pub fn start_of(date: NaiveDate) -> Self {
        Self(date.and_hms_opt(0, 0, 0).unwrap_or_default())
    }

    pub fn inner(&self) -> NaiveDateTime {
        self.0
    }

    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }

    pub fn plus_secs(&self, secs: u64) -> Self {
        Self(self.0 + Duration::seconds(secs as i64))
    }

    /// Render with an arbitrary chrono format (used by collaborator adapters).
    pub fn format_with(&self, fmt: &str) -> String {
        self.0.format(fmt).to_string()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl FromStr for Timestamp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("expected '{}', got '{}'", TIMESTAMP_FORMAT, s))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Half-open range `[earliest, latest)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub earliest: Timestamp,
    pub latest: Timestamp,
}

impl TimeRange {
    /// Rejects empty or inverted ranges.
    pub fn new(earliest: Timestamp, latest: Timestamp) -> Option<Self> {
        (earliest < latest).then_some(Self { earliest, latest })
    }

    /// The whole calendar day `[date 00:00:00, date+1 00:00:00)`.
    pub fn day(date: NaiveDate) -> Self {
        let next = date.succ_opt().unwrap_or(date);
        Self {
            earliest: Timestamp::start_of(date),
            latest: Timestamp::start_of(next),
        }
    }
}

/// Today's calendar date in UTC.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// The Friday closing the Saturday–Friday week that contains `date`.
pub fn week_ending_friday(date: NaiveDate) -> NaiveDate {
    // Days from `date` forward to Friday; Saturday is the first day of a week.
    let ahead = (Weekday::Fri.num_days_from_monday() + 7 - date.weekday().num_days_from_monday()) % 7;
    date + Duration::days(ahead as i64)
}

/// Most recent Friday on or before `date`.
pub fn last_friday_on_or_before(date: NaiveDate) -> NaiveDate {
    let back = (date.weekday().num_days_from_monday() + 7 - Weekday::Fri.num_days_from_monday()) % 7;
    date - Duration::days(back as i64)
}
