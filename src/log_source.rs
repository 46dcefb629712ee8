//! Log source for retrieving access logs from the Amplify log API

use crate::config::AppConfig;
use crate::error::{ArchiveError, Result};
use crate::models::TimeRange;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Error phrases with which the log API refuses an oversized window.
///
/// These are matched case-insensitively against 4xx response bodies. The
/// API does not document them, so a change in wording silently turns a
/// split signal into a client error; see [`classify_api_error`].
pub const RANGE_TOO_LARGE_MARKERS: &[&str] = &["reduce time range", "too many records"];

/// Raw answer of the log API for one window
#[derive(Debug, Clone, PartialEq)]
pub enum LogResponse {
    /// Body downloaded from the returned log URL (may be empty)
    Content(Bytes),
    /// The API answered without a log URL
    NoLogUrl,
}

/// Remote primitive used by the fetcher to request one window of logs
///
/// Implementations must report the range-too-large condition as
/// [`ArchiveError::RangeTooLarge`] and nothing else, and transient
/// conditions as errors for which [`ArchiveError::should_retry`] is true.
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn request_logs(&self, range: &TimeRange) -> Result<LogResponse>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAccessLogsRequest<'a> {
    domain_name: &'a str,
    start_time: String,
    end_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAccessLogsResponse {
    #[serde(default)]
    log_url: Option<String>,
}

/// HTTP client for the Amplify `GenerateAccessLogs` operation
///
/// The endpoint is expected to take care of request signing, for example a
/// SigV4 signing proxy in front of `amplify.<region>.amazonaws.com`.
pub struct AmplifyLogSource {
    client: Client,
    endpoint: String,
    app: AppConfig,
}

impl AmplifyLogSource {
    /// Create a new AmplifyLogSource with the default 60 second timeout
    pub fn new(endpoint: impl Into<String>, app: AppConfig) -> Result<Self> {
        Self::with_timeout(endpoint, app, Duration::from_secs(60))
    }

    /// Create a new AmplifyLogSource with a custom request timeout
    pub fn with_timeout(
        endpoint: impl Into<String>,
        app: AppConfig,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArchiveError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(AmplifyLogSource {
            client,
            endpoint: endpoint.into(),
            app,
        })
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    fn access_logs_url(&self) -> String {
        format!(
            "{}/apps/{}/accesslogs",
            self.endpoint.trim_end_matches('/'),
            self.app.app_id
        )
    }

    /// Ask the log API to generate logs for a window
    ///
    /// # Returns
    /// * `Ok(Some(url))` with the download URL
    /// * `Ok(None)` if the API answered without one
    /// * `Err(ArchiveError)` classified per [`classify_api_error`]
    async fn generate_access_logs(&self, range: &TimeRange) -> Result<Option<String>> {
        let url = self.access_logs_url();
        let body = GenerateAccessLogsRequest {
            domain_name: &self.app.domain_name,
            start_time: range.api_start(),
            end_time: range.api_end(),
        };

        debug!("Requesting access logs for app={} range={}", self.app.app_name, range);

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            warn!("Log API request failed for app={}: {}", self.app.app_name, e);
            ArchiveError::from(e)
        })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(classify_api_error(status.as_u16(), &text));
        }

        let parsed: GenerateAccessLogsResponse = serde_json::from_str(&text).map_err(|e| {
            ArchiveError::MalformedResponse(format!("Failed to parse log API response: {}", e))
        })?;

        Ok(parsed.log_url)
    }

    /// Download the generated log body
    async fn download(&self, log_url: &str) -> Result<Bytes> {
        let response = self.client.get(log_url).send().await?;
        let status = response.status();

        if status.as_u16() != 200 {
            warn!(
                "Failed to download logs for app={}: HTTP {}",
                self.app.app_name, status
            );
            return Err(ArchiveError::PayloadDownload {
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl LogSource for AmplifyLogSource {
    async fn request_logs(&self, range: &TimeRange) -> Result<LogResponse> {
        match self.generate_access_logs(range).await? {
            Some(log_url) => {
                info!("Got log URL for app={} ({})", self.app.app_name, range);
                let content = self.download(&log_url).await?;
                info!("Got log content ({} bytes)", content.len());
                Ok(LogResponse::Content(content))
            }
            None => {
                info!(
                    "Log API returned no log URL for app={} ({})",
                    self.app.app_name, range
                );
                Ok(LogResponse::NoLogUrl)
            }
        }
    }
}

/// Classify a non-2xx log API response
///
/// A 4xx body containing one of [`RANGE_TOO_LARGE_MARKERS`] becomes
/// [`ArchiveError::RangeTooLarge`]; everything else goes through
/// [`ArchiveError::from_http_status`]. A 4xx that mentions a time range
/// without a known marker is logged, since it usually means the upstream
/// wording changed.
pub fn classify_api_error(status: u16, body: &str) -> ArchiveError {
    let lowered = body.to_ascii_lowercase();

    if (400..500).contains(&status) {
        if RANGE_TOO_LARGE_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
        {
            return ArchiveError::RangeTooLarge(body.trim().to_string());
        }

        if lowered.contains("time range") {
            warn!(
                "Log API rejected a time range with an unrecognised message (HTTP {}): {}",
                status,
                body.trim()
            );
        }
    }

    ArchiveError::from_http_status(status, body.trim())
}
