//! Inclusive time windows expressed the way Slack's history API expects them.

use chrono::{DateTime, Utc};

use crate::error::{ArchiveError, Result};
use crate::message::parse_timestamp;

/// Inclusive `[oldest, latest]` range of Unix seconds as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryWindow {
    pub oldest: String,
    pub latest: String,
}

impl HistoryWindow {
    /// Builds a window from raw bounds, rejecting unparseable or inverted ones.
    pub fn new(oldest: impl Into<String>, latest: impl Into<String>) -> Result<Self> {
        let window = Self {
            oldest: oldest.into(),
            latest: latest.into(),
        };
        let (oldest, latest) = window.bounds()?;
        if oldest > latest {
            return Err(ArchiveError::InvalidWindow {
                oldest: window.oldest,
                latest: window.latest,
            });
        }
        Ok(window)
    }

    /// Window covering `begin` through `end` at whole-second precision.
    pub fn from_range(begin: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        Self::new(begin.timestamp().to_string(), end.timestamp().to_string())
    }

    /// Window covering two Unix-second instants.
    pub fn from_unix(begin: i64, end: i64) -> Result<Self> {
        Self::new(begin.to_string(), end.to_string())
    }

    pub fn bounds(&self) -> Result<(f64, f64)> {
        Ok((parse_timestamp(&self.oldest)?, parse_timestamp(&self.latest)?))
    }

    /// Same `oldest`, new `latest`.
    #[must_use]
    pub fn with_latest(&self, latest: f64) -> Self {
        Self {
            oldest: self.oldest.clone(),
            latest: format_timestamp(latest),
        }
    }
}

/// Shortest decimal form that parses back to the same value, never exponent
/// notation.
pub fn format_timestamp(ts: f64) -> String {
    format!("{ts}")
}
