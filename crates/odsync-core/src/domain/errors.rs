//! Domain error types
//!
//! This module defines error types specific to domain operations: validation
//! failures at construction time (`DomainError`), and the failure taxonomy of
//! a single reconciliation pass (`SyncError`).

use thiserror::Error;

/// Errors raised while constructing or manipulating domain value types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid hash format (expected 8 hex digits)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Path is not within the configured sync root
    #[error("Path not within sync root: {0}")]
    PathNotInSyncRoot(String),

    /// Invalid remote path format
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    /// Invalid remote ID format
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Invalid delta token
    #[error("Invalid delta token: {0}")]
    InvalidDeltaToken(String),

    /// Invalid etag
    #[error("Invalid etag: {0}")]
    InvalidETag(String),

    /// Invalid ctag
    #[error("Invalid ctag: {0}")]
    InvalidCTag(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}

/// Failure taxonomy for a single reconciliation pass.
///
/// An unsupported remote item is not an error — it's a classification
/// outcome, handled by recording it in the skipped-items set.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote API call failed at the transport level (network, HTTP
    /// status, auth). Not assumed transient; callers that want retry
    /// semantics wrap the call themselves.
    #[error("remote transport error: {0}")]
    RemoteTransport(#[source] anyhow::Error),

    /// A remote item or delta page could not be decoded into a well-formed
    /// `ItemRecord` (missing required field, malformed value).
    #[error("failed to decode remote item: {0}")]
    Decode(String),

    /// A local filesystem operation failed in a way the pass cannot
    /// recover from on its own.
    #[error("filesystem error on {path}: {source}")]
    Filesystem {
        /// Path the operation was attempted against.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An upload precondition (etag match) failed because the server's
    /// copy changed concurrently.
    #[error("precondition failed for {remote_id}: expected etag {expected}, server has {actual}")]
    PreconditionStale {
        /// The remote id whose precondition failed.
        remote_id: String,
        /// The etag this pass expected.
        expected: String,
        /// The etag the server actually holds.
        actual: String,
    },

    /// An invariant the engine relies on was violated (e.g. a folder
    /// reported as its own ancestor, an index row with no local or remote
    /// counterpart in a state that should be impossible).
    #[error("logical violation: {0}")]
    LogicalViolation(String),

    /// The persistent index itself failed (connection, migration, row
    /// decode). The index is an external collaborator whose internal
    /// failures this taxonomy doesn't otherwise enumerate, but it aborts
    /// the pass the same way `RemoteTransport` does.
    #[error("index storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

impl From<DomainError> for SyncError {
    fn from(err: DomainError) -> Self {
        SyncError::Decode(err.to_string())
    }
}
