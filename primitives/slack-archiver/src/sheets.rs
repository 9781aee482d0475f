//! Google Sheets sink: one sheet per channel, rows appended below existing content.

use std::collections::HashSet;
use std::sync::Mutex;

use archive_common::rows::{header_row, message_rows};
use archive_common::{ArchiveError, Message, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::archive::ChannelSink;
use crate::http::send_json;

pub const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4";

#[derive(Debug, Default, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Default, Deserialize)]
struct Sheet {
    #[serde(default)]
    properties: SheetProperties,
}

#[derive(Debug, Default, Deserialize)]
struct SheetProperties {
    #[serde(default)]
    title: String,
}

/// Minimal Sheets v4 client bound to one spreadsheet.
pub struct SheetsClient {
    http: Client,
    base_url: String,
    access_token: String,
    spreadsheet_id: String,
    retries: u32,
}

impl SheetsClient {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        spreadsheet_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            spreadsheet_id: spreadsheet_id.into(),
            retries: 0,
        }
    }

    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    fn spreadsheet_url(&self) -> String {
        format!("{}/spreadsheets/{}", self.base_url, self.spreadsheet_id)
    }

    pub async fn sheet_titles(&self) -> Result<HashSet<String>> {
        let url = self.spreadsheet_url();
        let spreadsheet: Spreadsheet = send_json("spreadsheets.get", self.retries, || {
            self.http
                .get(&url)
                .bearer_auth(&self.access_token)
                .query(&[("fields", "sheets.properties.title")])
        })
        .await?;

        Ok(spreadsheet
            .sheets
            .into_iter()
            .map(|sheet| sheet.properties.title)
            .collect())
    }

    pub async fn add_sheet(&self, title: &str) -> Result<()> {
        let url = format!("{}:batchUpdate", self.spreadsheet_url());
        let body = json!({
            "requests": [{"addSheet": {"properties": {"title": title}}}]
        });
        let _: Value = send_json("spreadsheets.batchUpdate", self.retries, || {
            self.http
                .post(&url)
                .bearer_auth(&self.access_token)
                .json(&body)
        })
        .await?;
        Ok(())
    }

    /// `values/<sheet>!A1:append` with the sheet title percent-encoded as
    /// one path segment.
    fn append_url(&self, sheet: &str) -> Result<Url> {
        let mut url = Url::parse(&self.spreadsheet_url())
            .map_err(|e| ArchiveError::Config(format!("invalid Sheets API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ArchiveError::Config("Sheets API URL has no path".to_string()))?
            .push("values")
            .push(&format!("{sheet}!A1:append"));
        Ok(url)
    }

    /// Appends `rows` after the last row of the table starting at `<sheet>!A1`.
    pub async fn append_rows(&self, sheet: &str, rows: &[Vec<String>]) -> Result<()> {
        let url = self.append_url(sheet)?;
        let body = json!({ "values": rows });
        let _: Value = send_json("spreadsheets.values.append", self.retries, || {
            self.http
                .post(url.clone())
                .bearer_auth(&self.access_token)
                .query(&[("valueInputOption", "RAW")])
                .json(&body)
        })
        .await?;
        Ok(())
    }
}

/// Writes each channel to a sheet named after it, creating the sheet and
/// its header row on first use.
pub struct SheetsSink {
    client: SheetsClient,
    existing: Mutex<HashSet<String>>,
}

impl SheetsSink {
    /// Loads the current sheet titles once.
    pub async fn connect(client: SheetsClient) -> Result<Self> {
        let existing = client.sheet_titles().await?;
        info!(sheets = existing.len(), "Loaded spreadsheet sheet titles");
        Ok(Self {
            client,
            existing: Mutex::new(existing),
        })
    }

    fn has_sheet(&self, title: &str) -> bool {
        self.existing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(title)
    }

    fn remember_sheet(&self, title: &str) {
        self.existing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(title.to_string());
    }
}

#[async_trait]
impl ChannelSink for SheetsSink {
    async fn write_channel(&self, channel_name: &str, messages: &[Message]) -> Result<()> {
        let rows = message_rows(messages)?;

        if !self.has_sheet(channel_name) {
            info!(sheet = channel_name, "Creating sheet");
            self.client.add_sheet(channel_name).await?;
            self.client
                .append_rows(channel_name, &[header_row()])
                .await?;
            self.remember_sheet(channel_name);
        }

        if rows.is_empty() {
            return Ok(());
        }

        self.client.append_rows(channel_name, &rows).await?;
        info!(sheet = channel_name, rows = rows.len(), "Appended rows");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use archive_common::ArchiveError;
    use httpmock::prelude::*;

    use super::*;

    const SHEET_ID: &str = "sheet-123";

    fn client(server: &MockServer) -> SheetsClient {
        SheetsClient::new(Client::new(), server.base_url(), "ya29.token", SHEET_ID)
    }

    async fn mock_titles(server: &MockServer, titles: &[&str]) {
        let sheets: Vec<Value> = titles
            .iter()
            .map(|t| json!({"properties": {"title": t}}))
            .collect();
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/spreadsheets/{SHEET_ID}"))
                    .query_param("fields", "sheets.properties.title")
                    .header("authorization", "Bearer ya29.token");
                then.status(200).json_body(json!({ "sheets": sheets }));
            })
            .await;
    }

    #[test]
    fn append_url_encodes_the_sheet_title() {
        let client = SheetsClient::new(Client::new(), SHEETS_API_URL, "ya29.token", SHEET_ID);

        let plain = client.append_url("daily_english").unwrap();
        assert_eq!(
            plain.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-123/values/daily_english!A1:append"
        );

        let awkward = client.append_url("a/b#c?d e").unwrap();
        assert_eq!(
            awkward.path(),
            "/v4/spreadsheets/sheet-123/values/a%2Fb%23c%3Fd%20e!A1:append"
        );
        assert_eq!(awkward.query(), None);
        assert_eq!(awkward.fragment(), None);
    }

    #[tokio::test]
    async fn creates_missing_sheet_with_header_then_appends() {
        let server = MockServer::start_async().await;
        mock_titles(&server, &["general"]).await;
        let add = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(format!("/spreadsheets/{SHEET_ID}:batchUpdate"))
                    .json_body(json!({
                        "requests": [{"addSheet": {"properties": {"title": "daily_english"}}}]
                    }));
                then.status(200).json_body(json!({"spreadsheetId": SHEET_ID, "replies": [{}]}));
            })
            .await;
        let header = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(format!("/spreadsheets/{SHEET_ID}/values/daily_english!A1:append"))
                    .query_param("valueInputOption", "RAW")
                    .json_body(json!({"values": [["Timestamp", "UserID", "Content"]]}));
                then.status(200).json_body(json!({"spreadsheetId": SHEET_ID}));
            })
            .await;
        let rows = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(format!("/spreadsheets/{SHEET_ID}/values/daily_english!A1:append"))
                    .json_body(json!({"values": [["2020-02-28T00:00:00Z", "U1", "morning"]]}));
                then.status(200).json_body(json!({"spreadsheetId": SHEET_ID}));
            })
            .await;

        let sink = SheetsSink::connect(client(&server)).await.unwrap();
        sink.write_channel(
            "daily_english",
            &[Message::new("1582848000.000100", "U1", "morning")],
        )
        .await
        .unwrap();

        add.assert_async().await;
        header.assert_async().await;
        rows.assert_async().await;
        assert!(sink.has_sheet("daily_english"));
    }

    #[tokio::test]
    async fn existing_sheet_only_gets_rows() {
        let server = MockServer::start_async().await;
        mock_titles(&server, &["general"]).await;
        let add = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(format!("/spreadsheets/{SHEET_ID}:batchUpdate"));
                then.status(200).json_body(json!({}));
            })
            .await;
        let append = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(format!("/spreadsheets/{SHEET_ID}/values/general!A1:append"));
                then.status(200).json_body(json!({}));
            })
            .await;

        let sink = SheetsSink::connect(client(&server)).await.unwrap();
        sink.write_channel(
            "general",
            &[
                Message::new("1582848000.000100", "U1", "one"),
                Message::new("1582848060.000100", "U2", "two"),
            ],
        )
        .await
        .unwrap();

        add.assert_hits_async(0).await;
        append.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn empty_channel_on_existing_sheet_makes_no_calls() {
        let server = MockServer::start_async().await;
        mock_titles(&server, &["general"]).await;
        let append = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({}));
            })
            .await;

        let sink = SheetsSink::connect(client(&server)).await.unwrap();
        sink.write_channel("general", &[]).await.unwrap();

        append.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn append_failure_is_reported() {
        let server = MockServer::start_async().await;
        mock_titles(&server, &["general"]).await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(format!("/spreadsheets/{SHEET_ID}/values/general!A1:append"));
                then.status(403).body("PERMISSION_DENIED");
            })
            .await;

        let sink = SheetsSink::connect(client(&server)).await.unwrap();
        let err = sink
            .write_channel("general", &[Message::new("1582848000.000100", "U1", "x")])
            .await
            .unwrap_err();

        assert!(matches!(err, ArchiveError::Status { status: 403, .. }));
        assert!(!err.is_recoverable());
    }
}
