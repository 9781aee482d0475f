//! Archive run: pick the allow-listed channels, extract their history,
//! emit NDJSON and hand each channel to a sink worker.

use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Arc;

use archive_common::{
    ArchiveError, HistoryApi, HistoryReader, HistoryWindow, Message, NdjsonWriter, Result,
};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// A Slack conversation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Lists the channels visible to the token.
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn list_channels(&self) -> Result<Vec<Channel>>;
}

/// Destination for one channel's extracted messages.
#[async_trait]
pub trait ChannelSink: Send + Sync {
    async fn write_channel(&self, channel_name: &str, messages: &[Message]) -> Result<()>;
}

/// Everything an archive run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Channel names to archive.
    pub channels: BTreeSet<String>,
    pub window: HistoryWindow,
    /// Extract and emit NDJSON but never call the sink.
    pub dry_run: bool,
    pub reader: HistoryReader,
}

impl ArchiveConfig {
    pub fn new(channels: impl IntoIterator<Item = String>, window: HistoryWindow) -> Self {
        Self {
            channels: parse_channel_list(channels),
            window,
            dry_run: false,
            reader: HistoryReader::default(),
        }
    }
}

/// Trims each entry and drops empty ones.
pub fn parse_channel_list(entries: impl IntoIterator<Item = String>) -> BTreeSet<String> {
    entries
        .into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub channels_matched: usize,
    pub messages_extracted: usize,
    pub channels_written: usize,
}

/// Runs one archive pass.
///
/// History is read one channel at a time in the calling task. Sink writes
/// run concurrently; every writer is awaited and the first failure is
/// returned once all of them have finished. An extraction failure stops
/// new writers from being started but still waits for the running ones.
pub async fn run_archive<W: Write>(
    config: &ArchiveConfig,
    directory: &dyn ChannelDirectory,
    history: &dyn HistoryApi,
    sink: Option<Arc<dyn ChannelSink>>,
    ndjson: &mut NdjsonWriter<W>,
) -> Result<ArchiveSummary> {
    let sink = match (config.dry_run, sink) {
        (true, _) => None,
        (false, Some(sink)) => Some(sink),
        (false, None) => {
            return Err(ArchiveError::Config(
                "a sink is required unless running dry".to_string(),
            ));
        }
    };

    info!(
        "Interested channels: {}",
        config.channels.iter().cloned().collect::<Vec<_>>().join(",")
    );
    info!(
        oldest = %config.window.oldest,
        latest = %config.window.latest,
        "Archive window"
    );

    let channels = directory.list_channels().await?;
    if channels.is_empty() {
        info!(
            "The server returned no channels; check the Slack token. Interested channels are {:?}",
            config.channels
        );
    }

    let mut summary = ArchiveSummary::default();
    let mut workers = JoinSet::new();
    let mut found = BTreeSet::new();
    let mut first_error = None;

    for channel in channels {
        if !config.channels.contains(&channel.name) {
            debug!(channel = %channel.name, "Skipping channel not on the allow-list");
            continue;
        }
        found.insert(channel.name.clone());
        summary.channels_matched += 1;

        // Writers already running are drained below, never dropped mid-write.
        let messages = match config
            .reader
            .read_messages(history, &channel.id, &config.window)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                error!(channel = %channel.name, "Reading history failed: {e}");
                first_error = Some(e);
                break;
            }
        };
        summary.messages_extracted += messages.len();

        if let Err(e) = ndjson.write_channel(&channel.name, &messages) {
            error!(channel = %channel.name, "Writing NDJSON failed: {e}");
            first_error = Some(e);
            break;
        }

        let Some(sink) = sink.as_ref() else {
            info!(channel = %channel.name, messages = messages.len(), "Dry run, skipping sink write");
            continue;
        };

        if messages.is_empty() {
            info!("There is no message returned in this channel ({})", channel.name);
        }

        let sink = Arc::clone(sink);
        workers.spawn(async move {
            let result = sink.write_channel(&channel.name, &messages).await;
            (channel.name, result)
        });
    }

    if first_error.is_none() {
        for missing in config.channels.difference(&found) {
            warn!(channel = %missing, "Allow-listed channel was not returned by Slack");
        }
    }

    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((name, Ok(()))) => {
                debug!(channel = %name, "Sink write complete");
                summary.channels_written += 1;
            }
            Ok((name, Err(e))) => {
                error!(channel = %name, "Sink write failed: {e}");
                first_error.get_or_insert(e);
            }
            Err(e) => {
                error!("Sink worker did not finish: {e}");
                first_error.get_or_insert(ArchiveError::Worker(e.to_string()));
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}
