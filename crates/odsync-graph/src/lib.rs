//! odsync-graph — Microsoft Graph API remote adapter
//!
//! Provides:
//! - OAuth2 authentication (Authorization Code with PKCE)
//! - `GraphRemote`, the `odsync_core::ports::RemotePort` implementation
//! - Delta queries for incremental synchronization
//! - Upload (simple and chunked session) support
//!
//! ## Modules
//!
//! - [`auth`] - OAuth2 PKCE authentication flow components
//! - [`client`] - Microsoft Graph API HTTP client
//! - [`delta`] - Delta query parsing
//! - [`upload`] - Upload request helpers
//! - [`remote`] - `RemotePort` implementation

pub mod auth;
pub mod client;
pub mod delta;
pub mod remote;
pub mod upload;

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when communicating with the Microsoft Graph API.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Authentication credentials are invalid or expired.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict was detected (e.g. an If-Match precondition failed).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The server's delta cursor is no longer valid (HTTP 410 Gone). The
    /// caller must restart from `DeltaToken::initial()`.
    #[error("delta cursor expired, full resync required")]
    CursorExpired,

    /// Rate limit exceeded; retry after the specified duration.
    #[error("too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration to wait before retrying.
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx).
    #[error("server error: {0}")]
    ServerError(String),

    /// A network-level error occurred.
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl GraphError {
    /// Whether retrying the same request later has a chance of succeeding.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GraphError::TooManyRequests { .. }
                | GraphError::ServerError(_)
                | GraphError::NetworkError(_)
        )
    }
}
