//! Local-state predicates: whether an indexed item still matches what's on disk.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use odsync_core::domain::{ItemRecord, ItemType, SyncError};
use odsync_core::ports::LocalFsPort;

/// Whether `record`'s indexed state still matches what's on disk at `path`.
///
/// A folder is synced iff the path exists and is a directory. A file is
/// synced iff the path exists, is a regular file, and either its mtime
/// (second precision) or its CRC32 matches the indexed row — mtime is tried
/// first to avoid rehashing unchanged content.
pub async fn is_synced(
    record: &ItemRecord,
    fs: &dyn LocalFsPort,
    path: &Path,
) -> Result<bool, SyncError> {
    let state = fs.state(path).await?;
    if !state.exists {
        return Ok(false);
    }

    match record.item_type {
        ItemType::Folder => Ok(state.is_dir),
        ItemType::File => {
            if !state.is_file {
                return Ok(false);
            }

            let local_mtime = fs.mtime(path).await?;
            if record.mtime_matches(local_mtime) {
                return Ok(true);
            }

            if let Some(expected) = &record.crc32 {
                let actual = fs.compute_crc32(path).await?;
                if &actual == expected {
                    return Ok(true);
                }
            }

            Ok(false)
        }
    }
}

/// Renames the local object at `path` out of the way so a different indexed
/// item can be placed there, never overwriting content the engine cannot
/// prove is the item it expects.
pub async fn safe_rename(path: &Path, fs: &dyn LocalFsPort) -> Result<PathBuf, SyncError> {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    let mut candidate = sidecar_name(path, suffix);
    while fs.state(&candidate).await?.exists {
        candidate = sidecar_name(path, suffix + 1);
    }

    fs.rename(path, &candidate).await?;
    Ok(candidate)
}

fn sidecar_name(path: &Path, suffix: u128) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let renamed = format!("{file_name}.conflict-{suffix}");
    match path.parent() {
        Some(parent) => parent.join(renamed),
        None => PathBuf::from(renamed),
    }
}
