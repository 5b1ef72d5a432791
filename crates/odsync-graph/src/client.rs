//! Microsoft Graph API client
//!
//! Provides a typed HTTP client for interacting with the Microsoft Graph API.
//! Handles authentication headers, JSON deserialization, and transient-error
//! retry with exponential backoff.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use odsync_graph::client::GraphClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = GraphClient::new("access-token-here");
//! let user_info = client.get_user_info().await?;
//! println!("Hello, {}", user_info.display_name);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use odsync_core::domain::RemoteId;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::GraphError;

/// Base URL for Microsoft Graph API v1.0.
const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Initial backoff delay for transient-error retries.
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Maximum number of retries for a transient failure (429 or 5xx).
const MAX_RETRIES: u32 = 5;

/// Default retry-after duration when the header is missing or unparseable.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

// ============================================================================
// Graph API response types
// ============================================================================

/// Information about the authenticated user and their drive quota.
#[derive(Debug, Clone, PartialEq)]
pub struct UserInfo {
    /// The user's email address.
    pub email: String,
    /// The user's display name.
    pub display_name: String,
    /// The user's Graph user id.
    pub id: String,
    /// Bytes currently used in the drive.
    pub quota_used: u64,
    /// Total bytes available in the drive.
    pub quota_total: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    display_name: Option<String>,
    mail: Option<String>,
    user_principal_name: Option<String>,
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveResponse {
    quota: Option<QuotaResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuotaResponse {
    total: Option<u64>,
    used: Option<u64>,
}

// ============================================================================
// GraphClient
// ============================================================================

/// HTTP client for Microsoft Graph API calls.
///
/// Wraps `reqwest::Client` with authentication headers, base URL
/// construction, and transient-error retry for the Microsoft Graph API.
pub struct GraphClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl GraphClient {
    /// Creates a new `GraphClient` with the given access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: GRAPH_BASE_URL.to_string(),
            access_token: access_token.into(),
        }
    }

    /// Creates a new `GraphClient` with a custom base URL (used in tests).
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            access_token: access_token.into(),
        }
    }

    /// Updates the access token, e.g. after a token refresh.
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
        debug!("updated GraphClient access token");
    }

    /// Returns the current access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Creates an authenticated request builder for the given method and path.
    ///
    /// Automatically prepends the base URL and adds the Authorization header.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(&self.access_token)
    }

    /// Creates an authenticated request builder against an absolute URL
    /// (e.g. a Graph `nextLink`/`deltaLink` or an upload session URL), rather
    /// than one relative to `base_url`.
    pub fn request_absolute(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.access_token)
    }

    /// Returns a reference to the underlying HTTP client, for operations that
    /// need to bypass `request`/`request_absolute` (e.g. chunked upload PUTs
    /// with custom headers).
    pub(crate) fn http_client(&self) -> &Client {
        &self.client
    }

    /// Retrieves information about the authenticated user and their quota.
    pub async fn get_user_info(&self) -> Result<UserInfo> {
        debug!("fetching user info from /me");

        let me: MeResponse = self
            .request(Method::GET, "/me")
            .send()
            .await
            .context("failed to fetch /me")?
            .error_for_status()
            .context("GET /me returned error status")?
            .json()
            .await
            .context("failed to parse /me response")?;

        let (quota_used, quota_total) = self.get_drive_quota().await?;

        let email = me
            .mail
            .or(me.user_principal_name)
            .unwrap_or_else(|| "unknown@unknown.com".to_string());
        let display_name = me
            .display_name
            .unwrap_or_else(|| "Unknown User".to_string());
        let id = me.id.unwrap_or_default();

        Ok(UserInfo {
            email,
            display_name,
            id,
            quota_used,
            quota_total,
        })
    }

    /// Retrieves drive quota as `(used_bytes, total_bytes)`.
    pub async fn get_drive_quota(&self) -> Result<(u64, u64)> {
        let drive: DriveResponse = self
            .request(Method::GET, "/me/drive")
            .send()
            .await
            .context("failed to fetch /me/drive")?
            .error_for_status()
            .context("GET /me/drive returned error status")?
            .json()
            .await
            .context("failed to parse /me/drive response")?;

        let used = drive.quota.as_ref().and_then(|q| q.used).unwrap_or(0);
        let total = drive.quota.as_ref().and_then(|q| q.total).unwrap_or(0);
        if total == 0 {
            warn!("drive quota total is 0, this may indicate an API issue");
        }
        Ok((used, total))
    }

    /// Downloads a file's content by its remote item id.
    pub async fn download_file(&self, id: &RemoteId) -> Result<Vec<u8>> {
        let path = format!("/me/drive/items/{}/content", id.as_str());
        debug!(id = id.as_str(), "downloading file");

        let response = self
            .execute_with_retry(|| self.request(Method::GET, &path))
            .await
            .context("failed to send download request")?;

        if !response.status().is_success() {
            return Err(response_to_error(response).await.into());
        }

        let bytes = response
            .bytes()
            .await
            .context("failed to read download response body")?;
        Ok(bytes.to_vec())
    }

    /// Executes a request built by `build`, retrying transient failures
    /// (429, 5xx, network errors) with exponential backoff.
    ///
    /// Classifies the response into a [`GraphError`] and retries only
    /// [`GraphError::is_transient`] outcomes, up to [`MAX_RETRIES`].
    pub async fn execute_with_retry<F>(&self, mut build: F) -> Result<Response, GraphError>
    where
        F: FnMut() -> RequestBuilder,
    {
        let mut backoff = INITIAL_BACKOFF;

        for attempt in 0..=MAX_RETRIES {
            let response = build().send().await.map_err(GraphError::NetworkError)?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
                    .unwrap_or(backoff);

                if attempt >= MAX_RETRIES {
                    warn!(attempts = attempt + 1, %status, "retry limit exhausted");
                    return Err(classify_status(status, "retry limit exhausted"));
                }

                info!(attempt, ?retry_after, %status, "transient failure, backing off");
                tokio::time::sleep(retry_after).await;
                backoff *= 2;
                continue;
            }

            if attempt > 0 {
                info!(attempt, "request succeeded after retry");
            }
            return Ok(response);
        }

        unreachable!("loop always returns before exhausting its range")
    }
}

/// Maps an HTTP status to a [`GraphError`] variant.
pub(crate) fn classify_status(status: StatusCode, detail: &str) -> GraphError {
    match status {
        StatusCode::UNAUTHORIZED => GraphError::Unauthorized(detail.to_string()),
        StatusCode::FORBIDDEN => GraphError::Forbidden(detail.to_string()),
        StatusCode::NOT_FOUND => GraphError::NotFound(detail.to_string()),
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
            GraphError::Conflict(detail.to_string())
        }
        StatusCode::GONE => GraphError::CursorExpired,
        StatusCode::TOO_MANY_REQUESTS => GraphError::TooManyRequests {
            retry_after: DEFAULT_RETRY_AFTER,
        },
        s if s.is_server_error() => GraphError::ServerError(format!("{s}: {detail}")),
        s => GraphError::InvalidResponse(format!("unexpected status {s}: {detail}")),
    }
}

/// Converts an error HTTP response into a [`GraphError`], reading the body
/// for diagnostic detail.
pub(crate) async fn response_to_error(response: Response) -> GraphError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    classify_status(status, &body)
}

/// Parses a `Retry-After` header value (seconds or HTTP-date).
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds);
    }
    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let now = chrono::Utc::now();
        let target = date.with_timezone(&chrono::Utc);
        if target > now {
            if let Ok(secs) = u64::try_from(target.signed_duration_since(now).num_seconds()) {
                if secs <= 3600 {
                    return Duration::from_secs(secs);
                }
            }
        }
    }
    default
}
