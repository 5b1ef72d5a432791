//! `SyncEngine`: the entry point a CLI or scheduler drives.
//!
//! Owns nothing durable itself — the cursor and index rows live in
//! `odsync-cache` behind `IndexPort` — but it is the one place that knows
//! how to sequence a download pass, drain the deletion queue, and run an
//! upload pass, against whichever adapters it was built with.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument};

use odsync_core::domain::{DeltaToken, RemotePath, SyncError};
use odsync_core::ports::{IndexPort, LocalFsPort, RemotePort};

use crate::deletion_queue::DeletionQueue;
use crate::download::DownloadReconciler;
use crate::upload::UploadReconciler;

/// What to diff during an upload pass.
#[derive(Debug, Clone)]
pub enum UploadScope {
    /// Diff every indexed row, then discover new entries anywhere under
    /// the sync root.
    Full,
    /// Diff only the subtree rooted at this absolute local path.
    Subtree(PathBuf),
}

/// The reconciliation engine's entry point.
pub struct SyncEngine {
    remote: Arc<dyn RemotePort>,
    index: Arc<dyn IndexPort>,
    fs: Arc<dyn LocalFsPort>,
    sync_root: PathBuf,
    remote_root: RemotePath,
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemotePort>,
        index: Arc<dyn IndexPort>,
        fs: Arc<dyn LocalFsPort>,
        sync_root: PathBuf,
        remote_root: RemotePath,
    ) -> Self {
        Self {
            remote,
            index,
            fs,
            sync_root,
            remote_root,
        }
    }

    /// Overwrite the persisted delta cursor, e.g. to force a full
    /// resynchronization from `DeltaToken::initial()`.
    pub async fn set_cursor(&self, cursor: &DeltaToken) -> Result<(), SyncError> {
        self.index.set_cursor(cursor).await
    }

    /// Run the download pass: page through the remote delta feed, applying
    /// every item in order, persisting the cursor after each page, then
    /// draining the deletion queue collected along the way.
    #[instrument(skip(self))]
    pub async fn apply_differences(&self) -> Result<(), SyncError> {
        let mut cursor = self.index.get_cursor().await?.unwrap_or_else(DeltaToken::initial);
        let reconciler =
            DownloadReconciler::new(self.remote.as_ref(), self.index.as_ref(), self.fs.as_ref(), &self.sync_root);

        let mut skipped = HashSet::new();
        let mut deletions = DeletionQueue::new();

        loop {
            let page = match self.remote.view_changes(&self.remote_root, &cursor).await {
                Ok(page) => page,
                Err(err) if self.remote.is_cursor_expired(&err) => {
                    info!("delta cursor expired, restarting from initial");
                    cursor = DeltaToken::initial();
                    continue;
                }
                Err(err) => return Err(err),
            };

            for item in &page.items {
                reconciler.apply_item(item, &mut skipped, &mut deletions).await?;
            }

            self.index.set_cursor(&page.next_cursor).await?;
            cursor = page.next_cursor;

            if !page.has_more {
                break;
            }
        }

        deletions.drain(self.fs.as_ref()).await
    }

    /// Run the upload pass over `scope`.
    pub async fn upload_differences(&self, scope: UploadScope) -> Result<(), SyncError> {
        let reconciler =
            UploadReconciler::new(self.remote.as_ref(), self.index.as_ref(), self.fs.as_ref(), &self.sync_root);
        match scope {
            UploadScope::Full => reconciler.full_pass().await,
            UploadScope::Subtree(path) => reconciler.subtree_pass(&path).await,
        }
    }

    /// Upload a single file, whether or not it is already indexed.
    pub async fn upload_file(&self, path: &Path) -> Result<(), SyncError> {
        let reconciler =
            UploadReconciler::new(self.remote.as_ref(), self.index.as_ref(), self.fs.as_ref(), &self.sync_root);
        reconciler.upload_file(path).await
    }

    /// Move/rename an indexed item from `from` to `to`.
    pub async fn move_item(&self, from: &Path, to: &Path) -> Result<(), SyncError> {
        let reconciler =
            UploadReconciler::new(self.remote.as_ref(), self.index.as_ref(), self.fs.as_ref(), &self.sync_root);
        reconciler.move_item(from, to).await
    }

    /// Delete the remote item and index row at `path`.
    pub async fn delete_by_path(&self, path: &Path) -> Result<(), SyncError> {
        let reconciler =
            UploadReconciler::new(self.remote.as_ref(), self.index.as_ref(), self.fs.as_ref(), &self.sync_root);
        reconciler.delete_by_path(path).await
    }
}
