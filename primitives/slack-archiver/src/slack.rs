//! Slack Web API client for channel listing and history.

use archive_common::{ArchiveError, HistoryApi, HistoryPage, HistoryWindow, Message, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::archive::{Channel, ChannelDirectory};
use crate::http::send_json;

pub const SLACK_API_URL: &str = "https://slack.com/api";

/// Channels requested per `conversations.list` page.
const CHANNEL_PAGE_SIZE: &str = "200";

/// Slack answers HTTP 200 with `ok: false` on API errors.
#[derive(Debug, Deserialize)]
struct SlackEnvelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryBody {
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ChannelsBody {
    #[serde(default)]
    channels: Vec<Channel>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

pub struct SlackClient {
    http: Client,
    base_url: String,
    token: String,
    page_size: u32,
    retries: u32,
}

impl SlackClient {
    pub fn new(http: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            page_size: 200,
            retries: 0,
        }
    }

    /// Messages requested per history page. Slack may return fewer.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    async fn call<T>(&self, method: &str, params: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, method);
        let envelope: SlackEnvelope<T> = send_json(method, self.retries, || {
            self.http.get(&url).bearer_auth(&self.token).query(params)
        })
        .await?;

        if !envelope.ok {
            return Err(ArchiveError::api(
                method,
                envelope.error.unwrap_or_else(|| "unknown".to_string()),
            ));
        }
        Ok(envelope.body)
    }
}

#[async_trait]
impl ChannelDirectory for SlackClient {
    async fn list_channels(&self) -> Result<Vec<Channel>> {
        let mut channels = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = vec![
                ("exclude_archived", "true".to_string()),
                ("types", "public_channel".to_string()),
                ("limit", CHANNEL_PAGE_SIZE.to_string()),
            ];
            if let Some(c) = cursor.as_ref() {
                params.push(("cursor", c.clone()));
            }

            let body: ChannelsBody = self.call("conversations.list", &params).await?;
            channels.extend(body.channels);

            cursor = body
                .response_metadata
                .and_then(|m| m.next_cursor)
                .filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
        }

        Ok(channels)
    }
}

#[async_trait]
impl HistoryApi for SlackClient {
    async fn fetch_history(&self, channel_id: &str, window: &HistoryWindow) -> Result<HistoryPage> {
        let params = [
            ("channel", channel_id.to_string()),
            ("oldest", window.oldest.clone()),
            ("latest", window.latest.clone()),
            ("inclusive", "true".to_string()),
            ("limit", self.page_size.to_string()),
        ];

        let body: HistoryBody = self.call("conversations.history", &params).await?;
        Ok(HistoryPage {
            messages: body.messages,
            has_more: body.has_more,
        })
    }
}
