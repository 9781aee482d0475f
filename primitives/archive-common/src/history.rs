//! Time-windowed walk over a channel's history.
//!
//! The history API returns pages newest-first. The reader keeps the lower
//! bound fixed and moves the upper bound just below the oldest message of
//! each page until the API runs out of data or the window is exhausted.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ArchiveError, Result};
use crate::message::{Message, is_interested_message, parse_timestamp};
use crate::window::HistoryWindow;

/// Gap subtracted from the oldest timestamp of a page to form the next
/// page's `latest` bound.
pub const DEFAULT_BOUNDARY_EPSILON: f64 = 0.5;

/// One page of channel history, newest message first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    pub has_more: bool,
}

/// A paginated channel-history endpoint.
#[async_trait]
pub trait HistoryApi: Send + Sync {
    /// Fetches the newest page of messages inside `window` (both bounds inclusive).
    async fn fetch_history(&self, channel_id: &str, window: &HistoryWindow) -> Result<HistoryPage>;
}

/// Collects the top-level messages of a channel within a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryReader {
    boundary_epsilon: f64,
}

impl Default for HistoryReader {
    fn default() -> Self {
        Self {
            boundary_epsilon: DEFAULT_BOUNDARY_EPSILON,
        }
    }
}

impl HistoryReader {
    /// `boundary_epsilon` must be positive; it also bounds the number of
    /// pages to `(latest - oldest) / boundary_epsilon + 1`.
    ///
    /// Messages posted less than `boundary_epsilon` seconds before the
    /// oldest message of a page fall into the gap and are skipped.
    pub fn new(boundary_epsilon: f64) -> Result<Self> {
        if !(boundary_epsilon.is_finite() && boundary_epsilon > 0.0) {
            return Err(ArchiveError::Config(format!(
                "boundary epsilon must be a positive number of seconds, got {boundary_epsilon}"
            )));
        }
        Ok(Self { boundary_epsilon })
    }

    pub fn boundary_epsilon(&self) -> f64 {
        self.boundary_epsilon
    }

    /// Returns the interested messages of `channel_id` inside `window`, page
    /// by page in the order the API returned them.
    pub async fn read_messages<A>(
        &self,
        api: &A,
        channel_id: &str,
        window: &HistoryWindow,
    ) -> Result<Vec<Message>>
    where
        A: HistoryApi + ?Sized,
    {
        let (oldest, _) = window.bounds()?;
        let mut current = window.clone();
        let mut seen = HashSet::new();
        let mut buf = Vec::new();
        let mut pages = 0usize;

        loop {
            let latest = parse_timestamp(&current.latest)?;
            let page = api.fetch_history(channel_id, &current).await?;
            pages += 1;

            let last_ts = match page.messages.last() {
                Some(last) if page.has_more => Some(last.timestamp()?),
                _ => None,
            };

            for message in page.messages {
                if is_interested_message(&message) && seen.insert(message.ts.clone()) {
                    buf.push(message);
                }
            }

            let Some(last_ts) = last_ts else {
                break;
            };
            if latest <= last_ts {
                debug!(channel_id, latest, last_ts, "history page made no progress");
                break;
            }

            let next_latest = last_ts - self.boundary_epsilon;
            if next_latest < oldest {
                break;
            }
            current = current.with_latest(next_latest);
        }

        debug!(channel_id, pages, messages = buf.len(), "Read channel history");
        Ok(buf)
    }
}
