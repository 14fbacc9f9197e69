//! # Nanosecond Timestamps
//!
//! A UTC instant stored as a signed count of nanoseconds since the Unix epoch.
//! The binary wire carries it as a `(seconds, nanos)` pair, the JSON wire as an
//! RFC 3339 string. The default value is the epoch itself.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::error::OtcError;

pub const NANOS_PER_MICROS: i64 = 1_000;
pub const NANOS_PER_MILLIS: i64 = 1_000 * NANOS_PER_MICROS;
pub const NANOS_PER_SECOND: i64 = 1_000 * NANOS_PER_MILLIS;

/// A UTC timestamp with nanosecond resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const EPOCH: Timestamp = Timestamp(0);

    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub fn from_micros(micros: i64) -> Self {
        Self(micros.saturating_mul(NANOS_PER_MICROS))
    }

    pub fn from_millis(millis: i64) -> Self {
        Self(millis.saturating_mul(NANOS_PER_MILLIS))
    }

    /// Builds a timestamp from whole seconds plus a nanosecond adjustment.
    pub fn from_seconds(seconds: i64, nanos: i64) -> Self {
        Self(seconds.saturating_mul(NANOS_PER_SECOND).saturating_add(nanos))
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        Self(Utc::now().timestamp_nanos_opt().unwrap_or_default())
    }

    pub fn now_plus_millis(millis: i64) -> Self {
        Self(Self::now().0.saturating_add(millis.saturating_mul(NANOS_PER_MILLIS)))
    }

    pub const fn nanos(&self) -> i64 {
        self.0
    }

    pub const fn micros(&self) -> i64 {
        self.0.div_euclid(NANOS_PER_MICROS)
    }

    pub const fn millis(&self) -> i64 {
        self.0.div_euclid(NANOS_PER_MILLIS)
    }

    pub const fn seconds(&self) -> i64 {
        self.0.div_euclid(NANOS_PER_SECOND)
    }

    pub fn total_seconds(&self) -> f64 {
        self.0 as f64 / NANOS_PER_SECOND as f64
    }

    pub fn total_millis(&self) -> f64 {
        self.0 as f64 / NANOS_PER_MILLIS as f64
    }

    /// Splits into the binary wire pair; `nanos` is always within `0..1e9`.
    pub const fn to_parts(&self) -> (i64, i32) {
        (
            self.0.div_euclid(NANOS_PER_SECOND),
            self.0.rem_euclid(NANOS_PER_SECOND) as i32,
        )
    }

    pub fn from_parts(seconds: i64, nanos: i32) -> Self {
        Self::from_seconds(seconds, i64::from(nanos))
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        let (seconds, nanos) = self.to_parts();
        // Every i64 nanosecond count lies inside chrono's representable range.
        DateTime::from_timestamp(seconds, nanos as u32).unwrap_or_default()
    }

    /// RFC 3339 with the shortest lossless fractional part and a `Z` suffix.
    pub fn to_rfc3339(&self) -> String {
        self.to_datetime().to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// Parses an ISO-8601/RFC 3339 string. A missing offset is read as UTC.
    pub fn parse_rfc3339(value: &str) -> Result<Self, OtcError> {
        let parsed = match DateTime::parse_from_rfc3339(value) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(_) => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc())
                .map_err(|e| OtcError::Decode(format!("invalid timestamp '{value}': {e}")))?,
        };
        parsed
            .timestamp_nanos_opt()
            .map(Self)
            .ok_or_else(|| OtcError::Decode(format!("timestamp out of range: '{value}'")))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value.timestamp_nanos_opt().unwrap_or_default())
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(value: Timestamp) -> Self {
        value.to_datetime()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}
