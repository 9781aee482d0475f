//! Spreadsheet row layout for archived messages.

use chrono::{DateTime, SecondsFormat};

use crate::error::{ArchiveError, Result};
use crate::message::Message;

pub const HEADER_ROW: [&str; 3] = ["Timestamp", "UserID", "Content"];

pub fn header_row() -> Vec<String> {
    HEADER_ROW.iter().map(|h| h.to_string()).collect()
}

/// `[RFC 3339 UTC time, user id, text]`, second precision.
pub fn message_row(message: &Message) -> Result<Vec<String>> {
    let ts = message.timestamp()?;
    let time = DateTime::from_timestamp(ts.floor() as i64, 0).ok_or_else(|| {
        ArchiveError::MalformedTimestamp {
            value: message.ts.clone(),
        }
    })?;

    Ok(vec![
        time.to_rfc3339_opts(SecondsFormat::Secs, true),
        message.user_id().to_string(),
        message.text.clone(),
    ])
}

pub fn message_rows(messages: &[Message]) -> Result<Vec<Vec<String>>> {
    messages.iter().map(message_row).collect()
}
