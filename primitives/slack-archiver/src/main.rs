//! Slack Archiver - Channel History Export
//!
//! Reads the top-level messages posted to selected Slack channels within a
//! time window, prints them to stdout as bulk-ingest NDJSON and appends
//! them to a Google Sheets spreadsheet (one sheet per channel).
//!
//! Logs go to stderr so stdout can be redirected straight into an index.
//!
//! # Usage
//!
//! ```bash
//! # Archive the last 24 hours of two channels
//! slack-archiver --token xoxb-... --sheet-id 1jlQ... --google-token ya29... \
//!     --channels daily_english,general
//!
//! # Explicit window, NDJSON only
//! slack-archiver --token xoxb-... --channels general \
//!     --begin 1582848000 --end 1582934400 --dry-run > slack.ndjson
//! ```

mod archive;
mod http;
mod sheets;
mod slack;

use std::io::BufWriter;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use archive_common::{HistoryReader, HistoryWindow, NdjsonWriter, ndjson::DEFAULT_INDEX};
use chrono::{DateTime, Utc};
use clap::Parser;
use reqwest::Client;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::archive::{ArchiveConfig, ChannelSink, run_archive};
use crate::sheets::{SHEETS_API_URL, SheetsClient, SheetsSink};
use crate::slack::{SLACK_API_URL, SlackClient};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Slack channel history exporter.
#[derive(Parser, Debug, Clone)]
#[command(name = "slack-archiver")]
#[command(about = "Archives Slack channel history to Google Sheets and NDJSON")]
struct Args {
    /// Slack bot token.
    #[arg(short, long, env = "SLACK_ARCHIVER_TOKEN")]
    token: String,

    /// Target spreadsheet ID. Required unless --dry-run.
    #[arg(short, long, env = "SLACK_ARCHIVER_SHEET_ID")]
    sheet_id: Option<String>,

    /// Google OAuth access token with the spreadsheets scope. Required unless --dry-run.
    #[arg(long, env = "SLACK_ARCHIVER_GOOGLE_TOKEN")]
    google_token: Option<String>,

    /// Comma-separated channel names to archive (e.g. "daily_english,general").
    #[arg(short, long, env = "SLACK_ARCHIVER_CHANNELS", value_delimiter = ',')]
    channels: Vec<String>,

    /// Start of the window in Unix seconds. Defaults to 24 hours before --end.
    #[arg(short, long, env = "SLACK_ARCHIVER_BEGIN", allow_hyphen_values = true)]
    begin: Option<i64>,

    /// End of the window in Unix seconds. Defaults to now.
    #[arg(short, long, env = "SLACK_ARCHIVER_END", allow_hyphen_values = true)]
    end: Option<i64>,

    /// Extract and print NDJSON without writing to the spreadsheet.
    #[arg(long, env = "SLACK_ARCHIVER_DRY_RUN")]
    dry_run: bool,

    /// Index name used in the NDJSON action lines.
    #[arg(long, env = "SLACK_ARCHIVER_INDEX", default_value = DEFAULT_INDEX)]
    index: String,

    /// Messages requested per history page.
    #[arg(long, env = "SLACK_ARCHIVER_PAGE_SIZE", default_value = "200")]
    page_size: u32,

    /// Seconds subtracted from a page's oldest timestamp to bound the next page.
    #[arg(long, env = "SLACK_ARCHIVER_BOUNDARY_EPSILON", default_value = "0.5")]
    boundary_epsilon: f64,

    /// Request timeout in seconds.
    #[arg(long, env = "SLACK_ARCHIVER_TIMEOUT", default_value = "30")]
    timeout: u64,

    /// Retries for rate-limited or transient failures.
    #[arg(short, long, env = "SLACK_ARCHIVER_RETRIES", default_value = "0")]
    retries: u32,

    /// Slack Web API base URL.
    #[arg(long, env = "SLACK_ARCHIVER_SLACK_API_URL", default_value = SLACK_API_URL)]
    slack_api_url: String,

    /// Google Sheets API base URL.
    #[arg(long, env = "SLACK_ARCHIVER_SHEETS_API_URL", default_value = SHEETS_API_URL)]
    sheets_api_url: String,
}

/// Spreadsheet coordinates, present unless running dry.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SheetTarget {
    spreadsheet_id: String,
    access_token: String,
}

/// Resolves defaults and validates the arguments against `now`.
fn archive_config(
    args: &Args,
    now: DateTime<Utc>,
) -> anyhow::Result<(ArchiveConfig, Option<SheetTarget>)> {
    let end = args.end.unwrap_or_else(|| now.timestamp());
    let begin = match args.begin {
        Some(begin) => begin,
        None => match end.checked_sub(SECONDS_PER_DAY) {
            Some(begin) => begin,
            None => bail!("--end {end} is too early to default --begin to a day before it"),
        },
    };
    let window = HistoryWindow::from_unix(begin, end).context("invalid --begin/--end")?;

    let mut config = ArchiveConfig::new(args.channels.iter().cloned(), window);
    config.dry_run = args.dry_run;
    config.reader = HistoryReader::new(args.boundary_epsilon)?;

    if config.channels.is_empty() {
        bail!("--channels must name at least one channel");
    }
    if args.page_size == 0 {
        bail!("--page-size must be at least 1");
    }

    let target = match (args.dry_run, &args.sheet_id, &args.google_token) {
        (true, _, _) => None,
        (false, Some(spreadsheet_id), Some(access_token)) => Some(SheetTarget {
            spreadsheet_id: spreadsheet_id.clone(),
            access_token: access_token.clone(),
        }),
        (false, None, _) => bail!("--sheet-id is required unless --dry-run is set"),
        (false, _, None) => bail!("--google-token is required unless --dry-run is set"),
    };

    Ok((config, target))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let (config, target) = archive_config(&args, Utc::now())?;

    let http = Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()?;

    let slack = SlackClient::new(http.clone(), &args.slack_api_url, &args.token)
        .with_page_size(args.page_size)
        .with_retries(args.retries);

    let sink: Option<Arc<dyn ChannelSink>> = match target {
        Some(target) => {
            let client = SheetsClient::new(
                http,
                &args.sheets_api_url,
                target.access_token,
                target.spreadsheet_id,
            )
            .with_retries(args.retries);
            let sink: Arc<dyn ChannelSink> = Arc::new(
                SheetsSink::connect(client)
                    .await
                    .context("failed to read spreadsheet")?,
            );
            Some(sink)
        }
        None => None,
    };

    let mut ndjson = NdjsonWriter::with_index(BufWriter::new(std::io::stdout()), &args.index);
    let summary = run_archive(&config, &slack, &slack, sink, &mut ndjson).await?;

    info!(
        channels = summary.channels_matched,
        messages = summary.messages_extracted,
        written = summary.channels_written,
        "Archive complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["slack-archiver", "--token", "xoxb-test"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 2, 29, 0, 0, 0).unwrap()
    }

    #[test]
    fn window_defaults_to_the_last_day() {
        let args = parse(&["--channels", "general", "--dry-run"]);
        let (config, target) = archive_config(&args, now()).unwrap();

        assert_eq!(config.window.oldest, "1582848000");
        assert_eq!(config.window.latest, "1582934400");
        assert!(config.dry_run);
        assert_eq!(target, None);
    }

    #[test]
    fn explicit_bounds_and_channel_list() {
        let args = parse(&[
            "--channels",
            "daily_english, general,,",
            "--begin",
            "1582000000",
            "--end",
            "1582100000",
            "--sheet-id",
            "sheet-123",
            "--google-token",
            "ya29.token",
        ]);
        let (config, target) = archive_config(&args, now()).unwrap();

        assert_eq!(config.window.oldest, "1582000000");
        assert_eq!(config.window.latest, "1582100000");
        assert_eq!(
            config.channels.iter().map(String::as_str).collect::<Vec<_>>(),
            ["daily_english", "general"]
        );
        assert_eq!(
            target,
            Some(SheetTarget {
                spreadsheet_id: "sheet-123".to_string(),
                access_token: "ya29.token".to_string(),
            })
        );
    }

    #[test]
    fn begin_defaults_relative_to_end() {
        let args = parse(&["--channels", "general", "--dry-run", "--end", "1582934400"]);
        let (config, _) = archive_config(&args, Utc::now()).unwrap();
        assert_eq!(config.window.oldest, "1582848000");
    }

    #[test]
    fn earliest_end_without_begin_is_rejected() {
        let end = i64::MIN.to_string();
        let args = parse(&["--channels", "general", "--dry-run", "--end", &end]);
        let err = archive_config(&args, now()).unwrap_err();
        assert!(err.to_string().contains("--begin"));
    }

    #[test]
    fn sheet_target_required_outside_dry_run() {
        let args = parse(&["--channels", "general", "--sheet-id", "sheet-123"]);
        let err = archive_config(&args, now()).unwrap_err();
        assert!(err.to_string().contains("--google-token"));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let args = parse(&[
            "--channels",
            "general",
            "--dry-run",
            "--begin",
            "1582934400",
            "--end",
            "1582848000",
        ]);
        assert!(archive_config(&args, now()).is_err());
    }

    #[test]
    fn empty_channel_list_is_rejected() {
        let args = parse(&["--dry-run"]);
        assert!(archive_config(&args, now()).is_err());
    }

    #[test]
    fn non_positive_epsilon_is_rejected() {
        let args = parse(&["--channels", "general", "--dry-run", "--boundary-epsilon", "0"]);
        assert!(archive_config(&args, now()).is_err());
    }
}
