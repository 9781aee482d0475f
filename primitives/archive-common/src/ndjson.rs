//! Bulk-ingest NDJSON encoding.
//!
//! Every message becomes two lines: an index action keyed by
//! `<channel>-<ts>` and the document itself.

use std::io::Write;

use serde::Serialize;

use crate::error::Result;
use crate::message::Message;

pub const DEFAULT_INDEX: &str = "slack";

#[derive(Debug, Serialize)]
struct IndexTarget<'a> {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_index")]
    index: &'a str,
}

#[derive(Debug, Serialize)]
struct BulkAction<'a> {
    index: IndexTarget<'a>,
}

#[derive(Debug, Serialize)]
struct ChannelMessage<'a> {
    channel: &'a str,
    /// Whole Unix seconds.
    datetime: &'a str,
    message: &'a Message,
}

/// Writes channel messages as bulk-ingest NDJSON.
pub struct NdjsonWriter<W> {
    out: W,
    index: String,
}

impl<W: Write> NdjsonWriter<W> {
    pub fn new(out: W) -> Self {
        Self::with_index(out, DEFAULT_INDEX)
    }

    pub fn with_index(out: W, index: impl Into<String>) -> Self {
        Self {
            out,
            index: index.into(),
        }
    }

    /// Writes both lines for every message and flushes. Returns the number of
    /// messages written.
    pub fn write_channel(&mut self, channel_name: &str, messages: &[Message]) -> Result<usize> {
        for message in messages {
            let action = BulkAction {
                index: IndexTarget {
                    id: format!("{}-{}", channel_name, message.ts),
                    index: &self.index,
                },
            };
            Self::write_line(&mut self.out, &action)?;

            let record = ChannelMessage {
                channel: channel_name,
                datetime: message.unix_seconds(),
                message,
            };
            Self::write_line(&mut self.out, &record)?;
        }
        self.out.flush()?;
        Ok(messages.len())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line<T: Serialize>(out: &mut W, value: &T) -> Result<()> {
        serde_json::to_writer(&mut *out, value)?;
        out.write_all(b"\n")?;
        Ok(())
    }
}
