//! Classifies a raw remote item blob and extracts canonical fields from it.

use chrono::{DateTime, Utc};

use super::errors::SyncError;
use super::item::{ItemRecord, ItemType};
use super::newtypes::{CTag, Crc32Hex, ETag, RemoteId};

/// A remote item as populated from a permissive decoder.
///
/// Only `id`, `name`, `etag`, `parent_id`, `mtime`, and the three presence
/// flags are ever required by the engine; everything else is optional, per
/// the remote item JSON shape this decodes (`id`, `name`, `eTag`, `cTag`,
/// `parentReference.id`, `fileSystemInfo.lastModifiedDateTime`, the
/// `deleted`/`file`/`folder` presence markers, and an optional
/// `file.hashes.crc32Hash`).
#[derive(Debug, Clone, Default)]
pub struct RawRemoteItem {
    pub id: String,
    pub name: String,
    pub etag: Option<String>,
    pub ctag: Option<String>,
    /// `parentReference.id`; absent means the sync root.
    pub parent_id: Option<String>,
    /// `fileSystemInfo.lastModifiedDateTime`, ISO-8601 extended.
    pub mtime: Option<String>,
    /// True iff the blob carries a non-null `deleted` marker.
    pub deleted: bool,
    /// True iff the blob carries a `file` object.
    pub file: bool,
    /// True iff the blob carries a `folder` object.
    pub folder: bool,
    /// `file.hashes.crc32Hash`, only meaningful when `file` is set.
    pub crc32: Option<String>,
}

/// The outcome of classifying one remote item blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The blob carries a non-null `deleted` marker. Deletion wins over
    /// type, so this is checked first.
    Deleted,
    /// A well-formed file or folder row.
    Item(ItemRecord),
    /// Neither a file nor a folder object was present, or a required field
    /// could not be decoded. Both cases are treated identically: the item
    /// is excluded from local application and added to the skipped set.
    Unsupported,
}

/// Classify `raw` and, where possible, recover its id.
///
/// Order: deleted → file → folder → unsupported. A missing or malformed
/// `id` is the one failure this cannot downgrade to `Unsupported`, since the
/// skipped-items set is keyed by id — that case is surfaced as a genuine
/// decode error.
///
/// # Errors
/// Returns `SyncError::Decode` only when `raw.id` itself fails to parse.
pub fn classify(raw: &RawRemoteItem) -> Result<(RemoteId, Classification), SyncError> {
    let id = RemoteId::new(raw.id.clone())?;

    if raw.deleted {
        return Ok((id, Classification::Deleted));
    }

    if raw.file {
        return Ok((id, decode_item(&id, raw, ItemType::File)));
    }

    if raw.folder {
        return Ok((id, decode_item(&id, raw, ItemType::Folder)));
    }

    Ok((id, Classification::Unsupported))
}

fn decode_item(id: &RemoteId, raw: &RawRemoteItem, item_type: ItemType) -> Classification {
    let Some(name) = non_empty(&raw.name) else {
        return Classification::Unsupported;
    };

    let Some(etag_raw) = raw.etag.as_ref() else {
        return Classification::Unsupported;
    };
    let Ok(etag) = ETag::new(etag_raw.clone()) else {
        return Classification::Unsupported;
    };

    // ctag covers content only; a remote that omits it is telling us
    // nothing has changed at the content level beyond what etag captures,
    // so fall back to etag rather than treating this as a decode failure.
    let ctag = match raw.ctag.as_ref() {
        Some(value) => match CTag::new(value.clone()) {
            Ok(ctag) => ctag,
            Err(_) => return Classification::Unsupported,
        },
        None => match CTag::new(etag_raw.clone()) {
            Ok(ctag) => ctag,
            Err(_) => return Classification::Unsupported,
        },
    };

    let Some(mtime_raw) = raw.mtime.as_ref() else {
        return Classification::Unsupported;
    };
    let Ok(mtime) = parse_mtime(mtime_raw) else {
        return Classification::Unsupported;
    };

    let parent_id = match raw.parent_id.as_ref() {
        Some(value) => match RemoteId::new(value.clone()) {
            Ok(parent_id) => Some(parent_id),
            Err(_) => return Classification::Unsupported,
        },
        None => None,
    };

    // A malformed crc32 is treated the same as an absent one; it only ever
    // narrows the comparisons `is_synced` can use, never blocks classification.
    let crc32 = if item_type == ItemType::File {
        raw.crc32.as_ref().and_then(|v| Crc32Hex::new(v.clone()).ok())
    } else {
        None
    };

    Classification::Item(ItemRecord {
        id: id.clone(),
        name: name.to_string(),
        item_type,
        etag,
        ctag,
        mtime: ItemRecord::truncate_to_seconds(mtime),
        parent_id,
        crc32,
    })
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn parse_mtime(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}
