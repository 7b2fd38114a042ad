//! Lock expiry dates.

use crate::error::{LockerError, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone};
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

const DATE_FORMAT: &str = "%Y%m%d";

static DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{8}$").expect("Invalid lastday regex"));

/// Inclusive last day of a lock, written `YYYYMMDD`.
///
/// The lock stays valid through the end of this day on the local clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LastDay(NaiveDate);

impl LastDay {
    /// Parse an 8-digit `YYYYMMDD` string naming a real calendar day.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || {
            LockerError::InputInvalid(format!(
                "invalid 'lastday' specified ('{}'), format is: YYYYMMDD",
                value
            ))
        };

        if !DATE_REGEX.is_match(value) {
            return Err(invalid());
        }

        let date = NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| invalid())?;

        // chrono tolerates some shapes that do not print back identically.
        if date.format(DATE_FORMAT).to_string() != value {
            return Err(invalid());
        }

        Ok(Self(date))
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Time left from `now` until the first instant of the following day in
    /// `now`'s time zone. `None` once that instant has passed.
    pub fn ttl_from<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<Duration> {
        let midnight = self.0.succ_opt()?.and_hms_opt(0, 0, 0)?;
        let tz = now.timezone();

        // Midnight can fall into a DST gap; the day then starts an hour later.
        let start = tz
            .from_local_datetime(&midnight)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())?;

        let ttl = start.signed_duration_since(now.clone());
        (ttl > Duration::zero()).then_some(ttl)
    }
}

impl fmt::Display for LastDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl FromStr for LastDay {
    type Err = LockerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for LastDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Whether `value` is a valid `YYYYMMDD` calendar date.
pub fn is_valid_date(value: &str) -> bool {
    LastDay::parse(value).is_ok()
}
