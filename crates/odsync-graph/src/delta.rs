//! Microsoft Graph delta query parsing
//!
//! Implements the delta query pattern for OneDrive, which provides efficient
//! incremental sync by returning only items that have changed since the last
//! poll.
//!
//! ## Delta query flow
//!
//! 1. **Initial sync**: request with `DeltaToken::initial()` (full enumeration).
//! 2. **Follow pages**: each page carries `@odata.nextLink` while more pages
//!    remain, and `@odata.deltaLink` on the last page of a cycle. Both are
//!    full absolute URLs; we hand the chosen one back as the next
//!    `DeltaToken` verbatim, and request it directly on the next call.
//! 3. **Incremental sync**: pass the token from the previous page's
//!    `DeltaPage::next_cursor` as `cursor`.

use reqwest::Method;
use serde::Deserialize;

use odsync_core::domain::{DeltaToken, RawRemoteItem, RemotePath};
use odsync_core::ports::DeltaPage;

use crate::client::{response_to_error, GraphClient};
use crate::GraphError;

/// Path for the delta endpoint relative to the Graph API base URL, rooted at
/// the drive root.
const ROOT_DELTA_PATH: &str = "/me/drive/root/delta";

// ============================================================================
// Microsoft Graph API response types (JSON deserialization)
// ============================================================================

/// Raw response from the Microsoft Graph delta API.
///
/// See: <https://learn.microsoft.com/en-us/graph/api/driveitem-delta>
#[derive(Debug, Deserialize)]
struct GraphDeltaResponse {
    #[serde(default)]
    value: Vec<GraphDriveItem>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
    #[serde(rename = "@odata.deltaLink")]
    delta_link: Option<String>,
}

/// A drive item from the Microsoft Graph delta response, matching exactly
/// the field set the engine's classifier reads.
#[derive(Debug, Deserialize)]
struct GraphDriveItem {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "eTag")]
    etag: Option<String>,
    #[serde(rename = "cTag")]
    ctag: Option<String>,
    #[serde(rename = "parentReference")]
    parent_reference: Option<GraphParentReference>,
    #[serde(rename = "fileSystemInfo")]
    file_system_info: Option<GraphFileSystemInfo>,
    file: Option<GraphFileFacet>,
    folder: Option<serde_json::Value>,
    deleted: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GraphParentReference {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphFileSystemInfo {
    last_modified_date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphFileFacet {
    hashes: Option<GraphHashes>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphHashes {
    crc32_hash: Option<String>,
}

impl From<GraphDriveItem> for RawRemoteItem {
    fn from(item: GraphDriveItem) -> Self {
        RawRemoteItem {
            id: item.id,
            name: item.name,
            etag: item.etag,
            ctag: item.ctag,
            parent_id: item.parent_reference.and_then(|p| p.id),
            mtime: item
                .file_system_info
                .and_then(|fsi| fsi.last_modified_date_time),
            deleted: item.deleted.is_some(),
            file: item.file.is_some(),
            folder: item.folder.is_some(),
            crc32: item
                .file
                .and_then(|f| f.hashes)
                .and_then(|h| h.crc32_hash),
        }
    }
}

/// Builds the relative request path for the first page of a delta cycle.
fn initial_path(root_path: &RemotePath) -> String {
    if root_path.as_str() == "/" {
        ROOT_DELTA_PATH.to_string()
    } else {
        format!("/me/drive/root:{}:/delta", root_path.as_str())
    }
}

/// Requests one page of the delta feed.
///
/// If `cursor` is [`DeltaToken::initial`], starts a fresh delta cycle scoped
/// to `root_path`. Otherwise `cursor` is treated as a full absolute URL
/// returned by a previous call (Graph's `nextLink`/`deltaLink` semantics) and
/// requested directly.
pub async fn get_delta_page(
    client: &GraphClient,
    root_path: &RemotePath,
    cursor: &DeltaToken,
) -> Result<DeltaPage, GraphError> {
    let response = if cursor.is_initial() {
        let path = initial_path(root_path);
        client
            .execute_with_retry(|| client.request(Method::GET, &path))
            .await?
    } else {
        client
            .execute_with_retry(|| client.request_absolute(Method::GET, cursor.as_str()))
            .await?
    };

    if !response.status().is_success() {
        return Err(response_to_error(response).await);
    }

    let parsed: GraphDeltaResponse = response
        .json()
        .await
        .map_err(|e| GraphError::InvalidResponse(e.to_string()))?;

    let has_more = parsed.next_link.is_some();
    let next_cursor_raw = parsed
        .next_link
        .or(parsed.delta_link)
        .unwrap_or_default();
    let next_cursor = DeltaToken::new(next_cursor_raw)
        .expect("DeltaToken::new is infallible");

    Ok(DeltaPage {
        items: parsed.value.into_iter().map(RawRemoteItem::from).collect(),
        next_cursor,
        has_more,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_path_for_root() {
        assert_eq!(initial_path(&RemotePath::root()), ROOT_DELTA_PATH);
    }

    #[test]
    fn initial_path_for_subtree() {
        let path = RemotePath::new("/Documents".to_string()).unwrap();
        assert_eq!(initial_path(&path), "/me/drive/root:/Documents:/delta");
    }

    #[test]
    fn graph_drive_item_converts_to_raw_remote_item() {
        let json = r#"{
            "id": "ITEM1",
            "name": "report.pdf",
            "eTag": "e1",
            "cTag": "c1",
            "parentReference": {"id": "PARENT1"},
            "fileSystemInfo": {"lastModifiedDateTime": "2026-01-01T00:00:00Z"},
            "file": {"hashes": {"crc32Hash": "DEADBEEF"}}
        }"#;
        let item: GraphDriveItem = serde_json::from_str(json).unwrap();
        let raw: RawRemoteItem = item.into();
        assert_eq!(raw.id, "ITEM1");
        assert!(raw.file);
        assert!(!raw.folder);
        assert!(!raw.deleted);
        assert_eq!(raw.crc32.as_deref(), Some("DEADBEEF"));
        assert_eq!(raw.parent_id.as_deref(), Some("PARENT1"));
    }

    #[test]
    fn deleted_item_has_deleted_marker() {
        let json = r#"{"id": "ITEM2", "name": "x", "deleted": {"state": "softDeleted"}}"#;
        let item: GraphDriveItem = serde_json::from_str(json).unwrap();
        let raw: RawRemoteItem = item.into();
        assert!(raw.deleted);
    }

    #[test]
    fn deserializes_full_delta_response_with_next_link() {
        let json = r#"{
            "value": [{"id": "A", "name": "a", "folder": {}}],
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/me/drive/root/delta?token=abc"
        }"#;
        let parsed: GraphDeltaResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.value.len(), 1);
        assert!(parsed.next_link.is_some());
        assert!(parsed.delta_link.is_none());
    }
}
