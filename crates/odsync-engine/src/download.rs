//! The download reconciler: converges local state and the index toward one
//! remote item at a time.

use std::path::Path;

use tracing::instrument;

use odsync_core::domain::{
    classify, Classification, ItemRecord, ItemType, RawRemoteItem, RemoteId, SyncError,
};
use odsync_core::ports::{IndexPort, LocalFsPort, RemotePort};

use crate::deletion_queue::DeletionQueue;
use crate::paths;
use crate::probe;

/// Applies a single remote delta item to the index and the local tree.
pub struct DownloadReconciler<'a> {
    remote: &'a dyn RemotePort,
    index: &'a dyn IndexPort,
    fs: &'a dyn LocalFsPort,
    sync_root: &'a Path,
}

impl<'a> DownloadReconciler<'a> {
    pub fn new(
        remote: &'a dyn RemotePort,
        index: &'a dyn IndexPort,
        fs: &'a dyn LocalFsPort,
        sync_root: &'a Path,
    ) -> Self {
        Self {
            remote,
            index,
            fs,
            sync_root,
        }
    }

    /// Apply one raw remote item. `skipped` accumulates ids whose blobs are
    /// unsupported (or descend from an unsupported parent) across the whole
    /// page; `deletions` accumulates local paths that still need removing,
    /// drained after the page completes.
    #[instrument(skip(self, skipped, deletions), fields(id = %raw.id))]
    pub async fn apply_item(
        &self,
        raw: &RawRemoteItem,
        skipped: &mut std::collections::HashSet<RemoteId>,
        deletions: &mut DeletionQueue,
    ) -> Result<(), SyncError> {
        let (id, classification) = classify(raw)?;

        let existing = self.index.lookup_by_id(&id).await?;

        // Step 2: an existing row whose local object no longer matches what
        // the index expects must be moved aside before anything else touches
        // its path, and is then treated as if it were never cached.
        let mut existing = existing;
        let mut existing_path = match &existing {
            Some(row) => Some(paths::local_path(self.index, self.sync_root, row).await?),
            None => None,
        };

        if let (Some(row), Some(path)) = (&existing, &existing_path) {
            if !probe::is_synced(row, self.fs, path).await? {
                probe::safe_rename(path, self.fs).await?;
                existing = None;
                existing_path = None;
            }
        }

        match classification {
            Classification::Deleted => {
                if let Some(path) = existing_path {
                    deletions.push(path);
                }
                self.index.delete(&id).await?;
                return Ok(());
            }
            Classification::Unsupported => {
                skipped.insert(id);
                return Ok(());
            }
            Classification::Item(ref item) => {
                if let Some(parent) = &item.parent_id {
                    if skipped.contains(parent) {
                        skipped.insert(id);
                        return Ok(());
                    }
                }
            }
        }

        let Classification::Item(new_item) = classification else {
            unreachable!("deleted and unsupported are handled above");
        };

        self.index.insert_or_replace(&new_item).await?;
        let n = self
            .index
            .lookup_by_id(&id)
            .await?
            .unwrap_or(new_item);

        let result = match (&existing, &existing_path) {
            (None, _) => self.apply_new(&n).await,
            (Some(r), Some(r_path)) => self.apply_changed(r, r_path, &n).await,
            (Some(_), None) => unreachable!("existing row always has a derivable path"),
        };

        if let Err(err) = result {
            // Roll back the index mutation from step 6 so a failed
            // application doesn't leave the index ahead of the filesystem.
            self.index.delete(&id).await?;
            return Err(err);
        }

        Ok(())
    }

    async fn apply_new(&self, n: &ItemRecord) -> Result<(), SyncError> {
        let path = paths::local_path(self.index, self.sync_root, n).await?;
        let state = self.fs.state(&path).await?;

        if state.exists {
            if probe::is_synced(n, self.fs, &path).await? {
                self.fs.set_mtime(&path, n.mtime).await?;
                return Ok(());
            }
            probe::safe_rename(&path, self.fs).await?;
        }

        match n.item_type {
            ItemType::File => {
                self.remote.download_by_id(&n.id, &path).await?;
            }
            ItemType::Folder => {
                self.fs.create_dir(&path).await?;
            }
        }

        self.fs.set_mtime(&path, n.mtime).await?;
        Ok(())
    }

    async fn apply_changed(
        &self,
        r: &ItemRecord,
        r_path: &Path,
        n: &ItemRecord,
    ) -> Result<(), SyncError> {
        if r.etag == n.etag {
            return Ok(());
        }

        let n_path = paths::local_path(self.index, self.sync_root, n).await?;

        if r_path != n_path {
            if self.fs.state(&n_path).await?.exists {
                probe::safe_rename(&n_path, self.fs).await?;
            }
            self.fs.rename(r_path, &n_path).await?;
        }

        if n.item_type == ItemType::File && r.ctag != n.ctag {
            self.remote.download_by_id(&n.id, &n_path).await?;
        }

        self.fs.set_mtime(&n_path, n.mtime).await?;
        Ok(())
    }
}
