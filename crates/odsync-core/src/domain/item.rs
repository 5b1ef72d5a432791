//! The canonical synced-item record and the predicates over it.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{CTag, Crc32Hex, ETag, RemoteId};

/// Guards against a corrupted parent chain turning path derivation into an
/// infinite loop; a real tree never nests this deep.
const MAX_PARENT_CHAIN_DEPTH: usize = 1024;

/// The remote-reported type of an item. The remote assigns a new id on a
/// type change, so a row never flips type in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    File,
    Folder,
}

/// One row of the persistent index.
///
/// `path` is deliberately not a field: it is always derived by walking
/// `parent_id` to the sync root (see [`derive_path`]), so it can never go
/// stale after a rename or re-parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    /// Opaque remote identifier; primary key; immutable for the item's
    /// lifetime.
    pub id: RemoteId,
    /// Final path segment as the remote sees it.
    pub name: String,
    pub item_type: ItemType,
    /// Covers metadata and content; changes on any remote-visible mutation.
    pub etag: ETag,
    /// Covers content only; unchanged by a pure metadata edit (e.g. rename).
    pub ctag: CTag,
    /// Last-modified instant. Always truncated to second precision before
    /// storage or comparison.
    pub mtime: DateTime<Utc>,
    /// Id of the containing folder; `None` means the row's parent is the
    /// sync root itself.
    pub parent_id: Option<RemoteId>,
    /// Hex CRC32 of file content, if the remote supplied one. Always `None`
    /// for folders.
    pub crc32: Option<Crc32Hex>,
}

impl ItemRecord {
    /// Truncate an instant to second precision, dropping any sub-second
    /// fraction, so local and remote timestamps compare equal regardless of
    /// source resolution.
    #[must_use]
    pub fn truncate_to_seconds(instant: DateTime<Utc>) -> DateTime<Utc> {
        DateTime::from_timestamp(instant.timestamp(), 0).unwrap_or(instant)
    }

    /// Whether this row and `other` carry the same `mtime`, compared at
    /// second precision (mtime comparisons always ignore sub-second
    /// fractions).
    #[must_use]
    pub fn mtime_matches(&self, other: DateTime<Utc>) -> bool {
        Self::truncate_to_seconds(self.mtime) == Self::truncate_to_seconds(other)
    }
}

/// Walk `parent_id` pointers up to the sync root to compute an item's path.
///
/// `lookup(id)` must return the `(parent_id, name)` of the row with that id;
/// per invariant I1 every `parent_id` that isn't `None` refers to an
/// existing row, so a lookup miss here indicates index corruption rather
/// than a legitimate "no parent" case.
///
/// # Errors
/// Returns `DomainError::ValidationFailed` if the parent chain is missing a
/// row it should contain, or exceeds the depth that any legitimate tree
/// could reach (a cycle).
pub fn derive_path(
    name: &str,
    parent_id: Option<&RemoteId>,
    lookup: impl Fn(&RemoteId) -> Option<(Option<RemoteId>, String)>,
) -> Result<PathBuf, DomainError> {
    let mut segments = vec![name.to_string()];
    let mut current = parent_id.cloned();
    let mut depth = 0usize;

    while let Some(id) = current {
        depth += 1;
        if depth > MAX_PARENT_CHAIN_DEPTH {
            return Err(DomainError::ValidationFailed(format!(
                "parent chain for {name} exceeds max depth; likely a cycle"
            )));
        }
        match lookup(&id) {
            Some((parent, parent_name)) => {
                segments.push(parent_name);
                current = parent;
            }
            None => {
                return Err(DomainError::ValidationFailed(format!(
                    "parent {id} of {name} is missing from the index"
                )));
            }
        }
    }

    segments.reverse();
    Ok(segments.into_iter().collect())
}
