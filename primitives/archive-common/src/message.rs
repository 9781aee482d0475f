//! Slack message model and the top-level message filter.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ArchiveError, Result};

/// A message as returned by `conversations.history`.
///
/// The fields the archiver inspects are typed; everything else Slack sends
/// is kept in `extra` so the NDJSON record carries the full payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Fractional Unix seconds, e.g. `"1582848000.000100"`. Unique per channel.
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(ts: impl Into<String>, user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            ts: ts.into(),
            user: Some(user.into()),
            text: text.into(),
            parent_user_id: None,
            subtype: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_parent_user_id(mut self, parent_user_id: impl Into<String>) -> Self {
        self.parent_user_id = Some(parent_user_id.into());
        self
    }

    #[must_use]
    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    /// Parses `ts` as fractional seconds.
    pub fn timestamp(&self) -> Result<f64> {
        parse_timestamp(&self.ts)
    }

    /// Integer part of `ts`. Does not validate the digits.
    pub fn unix_seconds(&self) -> &str {
        self.ts.split('.').next().unwrap_or_default()
    }

    pub fn user_id(&self) -> &str {
        self.user.as_deref().unwrap_or_default()
    }
}

/// Returns true for top-level messages: not a thread reply and not a
/// system event such as a channel join.
pub fn is_interested_message(message: &Message) -> bool {
    is_blank(&message.parent_user_id) && is_blank(&message.subtype)
}

fn is_blank(field: &Option<String>) -> bool {
    field.as_deref().is_none_or(str::is_empty)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|ts| ts.is_finite())
        .ok_or_else(|| ArchiveError::MalformedTimestamp {
            value: value.to_string(),
        })
}
