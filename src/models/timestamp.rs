//! Compact `YYYYMMDDHHmmss` timestamps, the interchange format for
//! `request_date`, `process_date` and entity date fields.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const COMPACT_FORMAT: &str = "%Y%m%d%H%M%S";

static COMPACT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{14}$").unwrap());
static MINUTES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}$").unwrap());
static SECONDS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").unwrap());
static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// A wall-clock instant rendered as 14 digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompactTimestamp(NaiveDateTime);

impl CompactTimestamp {
    pub fn now() -> Self {
        Self(Local::now().naive_local())
    }

    /// Accepts the shapes operators actually type or export from spreadsheets:
    /// compact digits, `YYYY-MM-DD HH:mm[:ss]`, a bare date, or RFC 3339.
    /// RFC 3339 inputs are converted to local time.
    pub fn parse_loose(input: &str) -> Option<Self> {
        let s = input.trim();
        if s.is_empty() {
            return None;
        }
        if COMPACT_RE.is_match(s) {
            return NaiveDateTime::parse_from_str(s, COMPACT_FORMAT).ok().map(Self);
        }
        if MINUTES_RE.is_match(s) {
            return NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").ok().map(Self);
        }
        if SECONDS_RE.is_match(s) {
            return NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok().map(Self);
        }
        if DATE_RE.is_match(s) {
            return NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(Self);
        }
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| Self(dt.with_timezone(&Local).naive_local()))
    }
}

impl fmt::Display for CompactTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(COMPACT_FORMAT))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("not a 14-digit compact timestamp: {0:?}")]
pub struct ParseTimestampError(String);

impl FromStr for CompactTimestamp {
    type Err = ParseTimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !COMPACT_RE.is_match(s) {
            return Err(ParseTimestampError(s.to_string()));
        }
        NaiveDateTime::parse_from_str(s, COMPACT_FORMAT)
            .map(Self)
            .map_err(|_| ParseTimestampError(s.to_string()))
    }
}

impl Serialize for CompactTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CompactTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Older records carry numbers or formatted strings; be lenient on read.
        let raw = serde_json::Value::deserialize(deserializer)?;
        let text = match &raw {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "expected timestamp, got {}",
                    other
                )))
            }
        };
        CompactTimestamp::parse_loose(&text)
            .ok_or_else(|| serde::de::Error::custom(ParseTimestampError(text)))
    }
}

/// Converts a loose date input into the compact string form, or `""` when the
/// input is absent or unparseable.
pub fn to_compact_or_empty(input: Option<&str>) -> String {
    input
        .and_then(CompactTimestamp::parse_loose)
        .map(|ts| ts.to_string())
        .unwrap_or_default()
}

/// Source of "now" for status stamps. Swappable so batches are reproducible in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> CompactTimestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> CompactTimestamp {
        CompactTimestamp::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub CompactTimestamp);

impl Clock for FixedClock {
    fn now(&self) -> CompactTimestamp {
        self.0
    }
}
