//! Time handling utilities.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Parse an ISO 8601 / RFC 3339 timestamp, assuming UTC when no zone is given.
pub fn parse_iso8601(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    // Try full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try without timezone (assume UTC)
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    // Try date only
    if let Ok(ndt) =
        NaiveDateTime::parse_from_str(&format!("{}T00:00:00", s), "%Y-%m-%dT%H:%M:%S")
    {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

/// A closed time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Build from epoch milliseconds.
    pub fn from_millis(start_ms: i64, end_ms: i64) -> Result<Self, TimeParseError> {
        let start = Utc
            .timestamp_millis_opt(start_ms)
            .single()
            .ok_or_else(|| TimeParseError::InvalidFormat(start_ms.to_string()))?;
        let end = Utc
            .timestamp_millis_opt(end_ms)
            .single()
            .ok_or_else(|| TimeParseError::InvalidFormat(end_ms.to_string()))?;
        Ok(Self { start, end })
    }

    /// Check if an instant falls in the window.
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        *instant >= self.start && *instant <= self.end
    }

    /// Check if an interval overlaps the window.
    pub fn intersects(&self, start: &DateTime<Utc>, end: &DateTime<Utc>) -> bool {
        *start <= self.end && *end >= self.start
    }

    /// Parse a "start/end" interval; either bound may be a date or a timestamp.
    pub fn from_interval_string(s: &str) -> Result<Self, TimeParseError> {
        let (start, end) = s
            .split_once('/')
            .ok_or_else(|| TimeParseError::InvalidFormat(s.to_string()))?;
        let range = Self::new(parse_iso8601(start.trim())?, parse_iso8601(end.trim())?);
        if range.end < range.start {
            return Err(TimeParseError::InvalidFormat(s.to_string()));
        }
        Ok(range)
    }

    /// "start/end" in RFC 3339, the STAC `datetime` interval syntax.
    pub fn to_interval_string(&self) -> String {
        format!(
            "{}/{}",
            self.start.format("%Y-%m-%dT%H:%M:%SZ"),
            self.end.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}
