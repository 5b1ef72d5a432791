//! Integration tests for delta (incremental sync) queries.
//!
//! Verifies end-to-end behavior of the delta module against a
//! wiremock-based Graph API mock server:
//! - Initial delta query (empty cursor)
//! - Incremental delta query (with a cursor from a previous page)
//! - Empty delta response
//! - Mixed item types (files, folders, deleted)

use odsync_core::domain::{DeltaToken, RemotePath};
use odsync_graph::client::GraphClient;
use odsync_graph::delta;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn initial_sync_returns_all_items() {
    let (server, client) = common::setup_graph_mock().await;

    let items = serde_json::json!([
        {
            "id": "file-001",
            "name": "document.txt",
            "eTag": "e1",
            "parentReference": { "id": "root" },
            "fileSystemInfo": { "lastModifiedDateTime": "2026-01-15T10:00:00Z" },
            "file": { "hashes": { "crc32Hash": "AAAAAAAA" } }
        },
        {
            "id": "folder-001",
            "name": "Documents",
            "parentReference": { "id": "root" },
            "folder": {}
        }
    ]);

    common::mount_delta_single_page(&server, items, "initial-token-001").await;

    let page = delta::get_delta_page(&client, &RemotePath::root(), &DeltaToken::initial())
        .await
        .expect("initial delta query failed");

    assert_eq!(page.items.len(), 2);
    assert!(!page.has_more);
    assert!(!page.next_cursor.is_initial());

    let file = &page.items[0];
    assert_eq!(file.id, "file-001");
    assert_eq!(file.name, "document.txt");
    assert!(file.file);
    assert!(!file.deleted);

    let folder = &page.items[1];
    assert_eq!(folder.id, "folder-001");
    assert!(folder.folder);
    assert!(!folder.deleted);
}

#[tokio::test]
async fn incremental_sync_uses_absolute_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/root/delta"))
        .and(query_param("token", "previous-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                {
                    "id": "file-002",
                    "name": "new-file.txt",
                    "file": {}
                }
            ],
            "@odata.deltaLink": format!(
                "{}/me/drive/root/delta?token=incremental-token-002",
                server.uri()
            )
        })))
        .mount(&server)
        .await;

    let client = GraphClient::with_base_url("test-token", server.uri());
    let cursor =
        DeltaToken::new(format!("{}/me/drive/root/delta?token=previous-token", server.uri()))
            .unwrap();

    let page = delta::get_delta_page(&client, &RemotePath::root(), &cursor)
        .await
        .expect("incremental delta query failed");

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, "file-002");
    assert!(!page.has_more);
}

#[tokio::test]
async fn empty_delta_response_returns_no_items() {
    let (server, client) = common::setup_graph_mock().await;

    common::mount_delta_single_page(&server, serde_json::json!([]), "empty-token").await;

    let page = delta::get_delta_page(&client, &RemotePath::root(), &DeltaToken::initial())
        .await
        .expect("empty delta query failed");

    assert!(page.items.is_empty());
    assert!(!page.has_more);
}

#[tokio::test]
async fn deleted_items_carry_the_deleted_marker() {
    let (server, client) = common::setup_graph_mock().await;

    let items = serde_json::json!([
        { "id": "del-001", "name": "removed.txt", "deleted": { "state": "deleted" } },
        { "id": "del-002", "name": "also-removed.pdf", "deleted": {} }
    ]);

    common::mount_delta_single_page(&server, items, "delete-token").await;

    let page = delta::get_delta_page(&client, &RemotePath::root(), &DeltaToken::initial())
        .await
        .expect("delta query with deleted items failed");

    assert_eq!(page.items.len(), 2);
    assert!(page.items[0].deleted);
    assert!(page.items[1].deleted);
}

#[tokio::test]
async fn mixed_item_types_classify_correctly() {
    let (server, client) = common::setup_graph_mock().await;

    let items = serde_json::json!([
        {
            "id": "file-mix",
            "name": "photo.jpg",
            "parentReference": { "id": "folder-pics" },
            "file": { "hashes": { "crc32Hash": "BBBBBBBB" } }
        },
        {
            "id": "folder-mix",
            "name": "Archive",
            "parentReference": { "id": "root" },
            "folder": {}
        },
        { "id": "del-mix", "name": "temp.log", "deleted": {} }
    ]);

    common::mount_delta_single_page(&server, items, "mixed-token").await;

    let page = delta::get_delta_page(&client, &RemotePath::root(), &DeltaToken::initial())
        .await
        .expect("mixed delta query failed");

    assert_eq!(page.items.len(), 3);
    assert!(page.items[0].file && !page.items[0].deleted);
    assert_eq!(page.items[0].crc32.as_deref(), Some("BBBBBBBB"));
    assert!(page.items[1].folder && !page.items[1].deleted);
    assert!(page.items[2].deleted && !page.items[2].file && !page.items[2].folder);
}
