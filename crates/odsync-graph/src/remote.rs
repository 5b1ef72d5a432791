//! `RemotePort` implementation backed by the Microsoft Graph API.
//!
//! Thin glue: each method builds the Graph request, sends it through
//! [`GraphClient::execute_with_retry`] so a transient 429/5xx is retried with
//! backoff before the caller ever sees it, and decodes the response into a
//! [`RawRemoteItem`] that is classified the same way a delta page item is.

use std::path::Path;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::debug;

use odsync_core::domain::{classify, DeltaToken, RawRemoteItem, RemoteId, RemotePath, SyncError};
use odsync_core::ports::{DeltaPage, MutationResult, RemotePort};

use crate::client::{response_to_error, GraphClient};
use crate::delta;
use crate::upload;
use crate::GraphError;

/// Minimal DriveItem shape for operations (patch, create folder) that don't
/// go through [`upload`]'s richer decoder.
#[derive(Debug, Deserialize)]
struct GraphMetadataItem {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "eTag")]
    etag: Option<String>,
    #[serde(rename = "cTag")]
    ctag: Option<String>,
    #[serde(rename = "parentReference")]
    parent_reference: Option<GraphParentRef>,
    #[serde(rename = "fileSystemInfo")]
    file_system_info: Option<GraphFileSystemInfo>,
    file: Option<serde_json::Value>,
    folder: Option<serde_json::Value>,
    deleted: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GraphParentRef {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphFileSystemInfo {
    last_modified_date_time: Option<String>,
}

impl From<GraphMetadataItem> for RawRemoteItem {
    fn from(item: GraphMetadataItem) -> Self {
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
            // Metadata patch/create responses never need the hash; content
            // identity is only ever read back from a delta page or upload.
            crc32: None,
        }
    }
}

/// Converts a `GraphError` surfaced by a mutation into the engine's
/// `SyncError`, recovering `PreconditionStale` from a 409/412 conflict when
/// the caller supplied an `If-Match` value.
fn mutation_error(err: GraphError, remote_id: &str, if_match_etag: Option<&str>) -> SyncError {
    match (&err, if_match_etag) {
        (GraphError::Conflict(detail), Some(expected)) => SyncError::PreconditionStale {
            remote_id: remote_id.to_string(),
            expected: expected.to_string(),
            actual: detail.clone(),
        },
        _ => SyncError::RemoteTransport(err.into()),
    }
}

fn raw_to_mutation_result(raw: RawRemoteItem) -> MutationResult {
    classify(&raw).map(|(_, classification)| classification)
}

/// `RemotePort` implementation for the Microsoft Graph API.
pub struct GraphRemote {
    client: GraphClient,
}

impl GraphRemote {
    /// Wraps an already-authenticated [`GraphClient`].
    #[must_use]
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemotePort for GraphRemote {
    async fn view_changes(
        &self,
        root_path: &RemotePath,
        cursor: &DeltaToken,
    ) -> Result<DeltaPage, SyncError> {
        debug!(root = %root_path, cursor_initial = cursor.is_initial(), "view_changes");
        delta::get_delta_page(&self.client, root_path, cursor)
            .await
            .map_err(|e| SyncError::RemoteTransport(e.into()))
    }

    async fn download_by_id(&self, id: &RemoteId, local_path: &Path) -> Result<(), SyncError> {
        debug!(%id, path = %local_path.display(), "download_by_id");
        let bytes = self
            .client
            .download_file(id)
            .await
            .map_err(SyncError::RemoteTransport)?;
        tokio::fs::write(local_path, bytes)
            .await
            .map_err(|source| SyncError::Filesystem {
                path: local_path.display().to_string(),
                source,
            })
    }

    async fn simple_upload(
        &self,
        local_path: &Path,
        remote_path: &RemotePath,
        if_match_etag: Option<&str>,
    ) -> MutationResult {
        let data = tokio::fs::read(local_path)
            .await
            .map_err(|source| SyncError::Filesystem {
                path: local_path.display().to_string(),
                source,
            })?;
        let parent = remote_path.parent().unwrap_or_else(RemotePath::root);
        let name = remote_path
            .file_name()
            .ok_or_else(|| SyncError::LogicalViolation(format!("{remote_path} has no file name")))?;

        let raw = upload::upload(&self.client, &parent, name, &data, if_match_etag)
            .await
            .map_err(|e| mutation_error(e, "", if_match_etag))?;
        raw_to_mutation_result(raw)
    }

    async fn update_by_id(
        &self,
        id: &RemoteId,
        patch: serde_json::Value,
        if_match_etag: Option<&str>,
    ) -> MutationResult {
        let path = format!("/me/drive/items/{}", id.as_str());
        debug!(%id, "update_by_id");

        let response = self
            .client
            .execute_with_retry(|| {
                let mut request = self.client.request(Method::PATCH, &path);
                if let Some(etag) = if_match_etag {
                    request = request.header("If-Match", etag);
                }
                request.json(&patch)
            })
            .await
            .map_err(|e| mutation_error(e, id.as_str(), if_match_etag))?;

        if !response.status().is_success() {
            let err = response_to_error(response).await;
            return Err(mutation_error(err, id.as_str(), if_match_etag));
        }

        let item: GraphMetadataItem = response
            .json()
            .await
            .map_err(|e| SyncError::Decode(e.to_string()))?;
        raw_to_mutation_result(item.into())
    }

    async fn delete_by_id(
        &self,
        id: &RemoteId,
        if_match_etag: Option<&str>,
    ) -> Result<(), SyncError> {
        let path = format!("/me/drive/items/{}", id.as_str());
        debug!(%id, "delete_by_id");

        let response = self
            .client
            .execute_with_retry(|| {
                let mut request = self.client.request(Method::DELETE, &path);
                if let Some(etag) = if_match_etag {
                    request = request.header("If-Match", etag);
                }
                request
            })
            .await
            .map_err(|e| mutation_error(e, id.as_str(), if_match_etag))?;

        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            let err = response_to_error(response).await;
            return Err(mutation_error(err, id.as_str(), if_match_etag));
        }
        Ok(())
    }

    async fn create_by_path(&self, parent_path: &RemotePath, name: &str) -> MutationResult {
        debug!(parent = %parent_path, name, "create_by_path");
        let path = if parent_path.as_str() == "/" {
            "/me/drive/root/children".to_string()
        } else {
            format!("/me/drive/root:{}:/children", parent_path.as_str())
        };

        let body = serde_json::json!({
            "name": name,
            "folder": {},
            "@microsoft.graph.conflictBehavior": "fail",
        });

        let response = self
            .client
            .execute_with_retry(|| self.client.request(Method::POST, &path).json(&body))
            .await
            .map_err(|e| SyncError::RemoteTransport(e.into()))?;

        if !response.status().is_success() {
            let err = response_to_error(response).await;
            return Err(SyncError::RemoteTransport(err.into()));
        }

        let item: GraphMetadataItem = response
            .json()
            .await
            .map_err(|e| SyncError::Decode(e.to_string()))?;
        raw_to_mutation_result(item.into())
    }

    fn is_cursor_expired(&self, err: &SyncError) -> bool {
        matches!(
            err,
            SyncError::RemoteTransport(e) if matches!(e.downcast_ref::<GraphError>(), Some(GraphError::CursorExpired))
        )
    }
}
