//! Path translation between the index's relative paths, absolute local
//! paths (rooted at the configured sync root), and remote paths (OneDrive's
//! `/drive/root:/…` addressing, rooted at `/`).
//!
//! The index never stores a path; it's always derived by walking
//! `parent_id` to the root (`derive_path`). `derive_path`'s lookup closure is
//! synchronous, but `IndexPort` is async, so [`local_path`] pre-fetches the
//! whole parent-chain graph in one call and derives against the owned map —
//! the same pattern `odsync-cache::SqliteIndex` uses internally for
//! `lookup_by_path`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use odsync_core::domain::{derive_path, ItemRecord, RemotePath, SyncError};
use odsync_core::ports::IndexPort;

/// The absolute local path of `record`.
pub async fn local_path(
    index: &dyn IndexPort,
    sync_root: &Path,
    record: &ItemRecord,
) -> Result<PathBuf, SyncError> {
    let all = index.enumerate_all().await?;
    let mut ancestors = HashMap::with_capacity(all.len());
    for row in &all {
        ancestors.insert(row.id.clone(), (row.parent_id.clone(), row.name.clone()));
    }

    let relative = derive_path(&record.name, record.parent_id.as_ref(), |id| {
        ancestors.get(id).cloned()
    })?;
    Ok(sync_root.join(relative))
}

/// `absolute`'s path relative to `sync_root`, in the form `IndexPort`
/// expects.
pub fn relative_path(sync_root: &Path, absolute: &Path) -> Result<PathBuf, SyncError> {
    absolute
        .strip_prefix(sync_root)
        .map(Path::to_path_buf)
        .map_err(|_| {
            SyncError::LogicalViolation(format!(
                "{} is not within sync root {}",
                absolute.display(),
                sync_root.display()
            ))
        })
}

/// Renders a sync-root-relative path as a remote path (`/a/b/c`).
pub fn remote_path(relative: &Path) -> Result<RemotePath, SyncError> {
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    RemotePath::new(format!("/{}", segments.join("/"))).map_err(SyncError::from)
}
