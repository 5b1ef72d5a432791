//! The remote API port.
//!
//! Implemented by `odsync-graph` against the real Microsoft Graph API; the
//! engine only ever depends on this trait.

use async_trait::async_trait;

use crate::domain::{Classification, DeltaToken, RemoteId, RemotePath, SyncError};

/// One page of the server's delta feed.
#[derive(Debug, Clone)]
pub struct DeltaPage {
    /// Items in this page, in server order. Each is the raw, not-yet-typed
    /// decode the engine passes to `classify`.
    pub items: Vec<crate::domain::RawRemoteItem>,
    /// Cursor to request the next page with.
    pub next_cursor: DeltaToken,
    /// Whether a further page is available after this one.
    pub has_more: bool,
}

/// The response to a mutation (upload, metadata patch, folder creation):
/// always the server's own view of the row, run back through the same
/// classifier every delta item goes through.
pub type MutationResult = Result<Classification, SyncError>;

/// Remote API operations the engine consumes.
///
/// Precondition tags (`if_match_etag`) are passed through untouched; it is
/// the adapter's job to turn a rejected precondition into
/// `SyncError::PreconditionStale`.
#[async_trait]
pub trait RemotePort: Send + Sync {
    /// List one page of remote changes under `root_path` since `cursor`.
    /// The initial cursor is an empty string (full enumeration). A cursor
    /// the server has expired surfaces as `SyncError::RemoteTransport`
    /// wrapping a cause the caller can recognize as "cursor expired" and
    /// restart from empty.
    async fn view_changes(
        &self,
        root_path: &RemotePath,
        cursor: &DeltaToken,
    ) -> Result<DeltaPage, SyncError>;

    /// Download the content of `id` to `local_path`. Atomic replace is not
    /// required of the adapter; the engine never calls this against a path
    /// it cannot afford to leave partially written.
    async fn download_by_id(
        &self,
        id: &RemoteId,
        local_path: &std::path::Path,
    ) -> Result<(), SyncError>;

    /// Create-or-replace a file's content at `remote_path` in one call.
    async fn simple_upload(
        &self,
        local_path: &std::path::Path,
        remote_path: &RemotePath,
        if_match_etag: Option<&str>,
    ) -> MutationResult;

    /// Patch an item's metadata (rename, re-parent, or push an mtime) by id.
    async fn update_by_id(
        &self,
        id: &RemoteId,
        patch: serde_json::Value,
        if_match_etag: Option<&str>,
    ) -> MutationResult;

    /// Delete an item by id, guarded by a precondition tag.
    async fn delete_by_id(&self, id: &RemoteId, if_match_etag: Option<&str>)
        -> Result<(), SyncError>;

    /// Create a folder named `name` under `parent_path`.
    async fn create_by_path(&self, parent_path: &RemotePath, name: &str) -> MutationResult;

    /// Whether `err` (as returned from `view_changes`) means the server has
    /// invalidated the delta cursor and the caller must restart from
    /// `DeltaToken::initial()`. Adapters with no such concept can rely on
    /// the default `false`.
    fn is_cursor_expired(&self, err: &SyncError) -> bool {
        let _ = err;
        false
    }
}
