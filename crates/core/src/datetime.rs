//! Provider datetime normalization.
//!
//! The provider mixes two encodings in the same feed:
//! - `2024-01-01T00:00:00.000+01:00` (sub-second precision, UTC offset)
//! - `2024-01-01T00:00:00` (no offset, optional sub-seconds; read as UTC)
//!
//! Formats are tried in that order. Every result is converted to UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// Offset-aware format with fractional seconds.
pub const PRIMARY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";

/// Naive format without offset. Fractional seconds are optional.
pub const SECONDARY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A datetime string matched none of the known formats.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized datetime '{input}'")]
pub struct ParseError {
    pub input: String,
}

impl ParseError {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Parses a provider datetime into a UTC instant.
pub fn parse_provider_datetime(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_str(raw, PRIMARY_FORMAT) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, SECONDARY_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| ParseError::new(raw))
}
