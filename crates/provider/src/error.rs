//! Fetch errors.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Every way a fetch can fail.
///
/// Status failures keep the response body for diagnostics.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("provider returned status {status} (content-type: {content_type}): {body}")]
    Status {
        status: u16,
        content_type: String,
        body: String,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode provider response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid time range: start {start} is after end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl FetchError {
    /// Transport failures, server errors and throttling are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Decode(_) | Self::Url(_) | Self::InvalidRange { .. } => false,
        }
    }

    /// HTTP status if the provider answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
