//! Request execution shared by the Slack and Sheets clients.

use std::time::Duration;

use archive_common::{ArchiveError, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::warn;

/// Sends the request built by `build` and decodes a JSON body.
///
/// Recoverable failures are retried up to `retries` times, honouring
/// `Retry-After` on 429 and otherwise backing off linearly.
pub async fn send_json<T, F>(operation: &str, retries: u32, mut build: F) -> Result<T>
where
    T: DeserializeOwned,
    F: FnMut() -> RequestBuilder,
{
    let max_attempts = retries + 1;
    let mut attempts = 0;

    loop {
        attempts += 1;

        match send_once(operation, build()).await {
            Ok(body) => return Ok(body),
            Err(e) if e.is_recoverable() && attempts < max_attempts => {
                let wait = e
                    .retry_after()
                    .unwrap_or_else(|| Duration::from_millis(100 * u64::from(attempts)));
                warn!(
                    "{operation} failed: {e}, retrying in {wait:?} ({attempts}/{max_attempts})"
                );
                tokio::time::sleep(wait).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn send_once<T: DeserializeOwned>(operation: &str, request: RequestBuilder) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| ArchiveError::transport(operation, e))?;
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(ArchiveError::RateLimited {
            operation: operation.to_string(),
            retry_after,
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| ArchiveError::transport(operation, e))?;

    if !status.is_success() {
        return Err(ArchiveError::Status {
            operation: operation.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    Ok(serde_json::from_str(&body)?)
}
