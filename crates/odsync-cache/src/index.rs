//! `SqliteIndex` — the persistent index, implemented over SQLite.
//!
//! Row mapping reconstructs domain types from plain columns rather than
//! relying on `sqlx`'s derive macros, since every non-trivial field is a
//! validated newtype.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use odsync_core::domain::{
    derive_path, CTag, Crc32Hex, DeltaToken, ETag, ItemRecord, ItemType, RemoteId, SyncError,
};
use odsync_core::ports::IndexPort;

use crate::pool::DatabasePool;
use crate::CacheError;

/// `IndexPort` implementation backed by a SQLite database.
pub struct SqliteIndex {
    pool: DatabasePool,
}

impl SqliteIndex {
    #[must_use]
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Every parent-chain edge in the index, as `(id -> (parent_id, name))`,
    /// used to derive paths without a recursive SQL query.
    async fn ancestor_map(&self) -> Result<HashMap<RemoteId, (Option<RemoteId>, String)>, CacheError> {
        let rows = sqlx::query("SELECT id, parent_id, name FROM items")
            .fetch_all(self.pool.pool())
            .await?;

        let mut map = HashMap::with_capacity(rows.len());
        for row in &rows {
            let id = remote_id_column(row, "id")?;
            let parent_id = optional_remote_id_column(row, "parent_id")?;
            let name: String = row.try_get("name").map_err(CacheError::Sqlite)?;
            map.insert(id, (parent_id, name));
        }
        Ok(map)
    }
}

#[async_trait]
impl IndexPort for SqliteIndex {
    async fn insert_or_replace(&self, record: &ItemRecord) -> Result<(), SyncError> {
        let item_type = match record.item_type {
            ItemType::File => "file",
            ItemType::Folder => "folder",
        };

        sqlx::query(
            "INSERT INTO items (id, name, item_type, etag, ctag, mtime, parent_id, crc32)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                item_type = excluded.item_type,
                etag = excluded.etag,
                ctag = excluded.ctag,
                mtime = excluded.mtime,
                parent_id = excluded.parent_id,
                crc32 = excluded.crc32",
        )
        .bind(record.id.as_str())
        .bind(&record.name)
        .bind(item_type)
        .bind(record.etag.as_str())
        .bind(record.ctag.as_str())
        .bind(record.mtime.to_rfc3339())
        .bind(record.parent_id.as_ref().map(RemoteId::as_str))
        .bind(record.crc32.as_ref().map(Crc32Hex::as_str))
        .execute(self.pool.pool())
        .await
        .map_err(CacheError::Sqlite)?;

        Ok(())
    }

    async fn delete(&self, id: &RemoteId) -> Result<(), SyncError> {
        sqlx::query("DELETE FROM items WHERE id = ?1")
            .bind(id.as_str())
            .execute(self.pool.pool())
            .await
            .map_err(CacheError::Sqlite)?;
        Ok(())
    }

    async fn lookup_by_id(&self, id: &RemoteId) -> Result<Option<ItemRecord>, SyncError> {
        let row = sqlx::query("SELECT * FROM items WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(self.pool.pool())
            .await
            .map_err(CacheError::Sqlite)?;

        row.map(|r| item_record_from_row(&r).map_err(SyncError::from))
            .transpose()
    }

    async fn lookup_by_path(&self, path: &Path) -> Result<Option<ItemRecord>, SyncError> {
        let ancestors = self.ancestor_map().await?;
        let all = self.enumerate_all().await?;

        for record in all {
            let derived = derive_path(&record.name, record.parent_id.as_ref(), |id| {
                ancestors.get(id).cloned()
            })
            .map_err(|e| SyncError::LogicalViolation(e.to_string()))?;
            if derived == path {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    async fn enumerate_all(&self) -> Result<Vec<ItemRecord>, SyncError> {
        let rows = sqlx::query("SELECT * FROM items")
            .fetch_all(self.pool.pool())
            .await
            .map_err(CacheError::Sqlite)?;

        rows.iter()
            .map(|r| item_record_from_row(r).map_err(SyncError::from))
            .collect()
    }

    async fn get_cursor(&self) -> Result<Option<DeltaToken>, SyncError> {
        let row = sqlx::query("SELECT token FROM cursor WHERE id = 1")
            .fetch_optional(self.pool.pool())
            .await
            .map_err(CacheError::Sqlite)?;

        match row {
            Some(r) => {
                let token: String = r.try_get("token").map_err(CacheError::Sqlite)?;
                let parsed = DeltaToken::new(token)
                    .map_err(|e| CacheError::SerializationError(e.to_string()))?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    async fn set_cursor(&self, cursor: &DeltaToken) -> Result<(), SyncError> {
        sqlx::query(
            "INSERT INTO cursor (id, token) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET token = excluded.token",
        )
        .bind(cursor.as_str())
        .execute(self.pool.pool())
        .await
        .map_err(CacheError::Sqlite)?;
        Ok(())
    }
}

fn remote_id_column(row: &SqliteRow, column: &str) -> Result<RemoteId, CacheError> {
    let raw: String = row
        .try_get(column)
        .map_err(CacheError::Sqlite)?;
    RemoteId::new(raw).map_err(|e| CacheError::SerializationError(e.to_string()))
}

fn optional_remote_id_column(row: &SqliteRow, column: &str) -> Result<Option<RemoteId>, CacheError> {
    let raw: Option<String> = row
        .try_get(column)
        .map_err(CacheError::Sqlite)?;
    raw.map(RemoteId::new)
        .transpose()
        .map_err(|e| CacheError::SerializationError(e.to_string()))
}

fn item_record_from_row(row: &SqliteRow) -> Result<ItemRecord, CacheError> {
    let id = remote_id_column(row, "id")?;
    let name: String = row.try_get("name").map_err(CacheError::Sqlite)?;
    let item_type_str: String = row.try_get("item_type").map_err(CacheError::Sqlite)?;
    let item_type = match item_type_str.as_str() {
        "file" => ItemType::File,
        "folder" => ItemType::Folder,
        other => {
            return Err(CacheError::SerializationError(format!(
                "unknown item_type '{other}'"
            )))
        }
    };

    let etag_raw: String = row.try_get("etag").map_err(CacheError::Sqlite)?;
    let etag = ETag::new(etag_raw).map_err(|e| CacheError::SerializationError(e.to_string()))?;

    let ctag_raw: String = row.try_get("ctag").map_err(CacheError::Sqlite)?;
    let ctag = CTag::new(ctag_raw).map_err(|e| CacheError::SerializationError(e.to_string()))?;

    let mtime_raw: String = row.try_get("mtime").map_err(CacheError::Sqlite)?;
    let mtime = parse_datetime(&mtime_raw)?;

    let parent_id = optional_remote_id_column(row, "parent_id")?;

    let crc32_raw: Option<String> = row.try_get("crc32").map_err(CacheError::Sqlite)?;
    let crc32 = crc32_raw
        .map(Crc32Hex::new)
        .transpose()
        .map_err(|e| CacheError::SerializationError(e.to_string()))?;

    Ok(ItemRecord {
        id,
        name,
        item_type,
        etag,
        ctag,
        mtime,
        parent_id,
        crc32,
    })
}

/// Parse a stored timestamp, preferring RFC3339 but tolerating the naive
/// formats SQLite's own `CURRENT_TIMESTAMP` would produce.
fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, CacheError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(CacheError::SerializationError(format!(
        "unparseable timestamp: {raw}"
    )))
}
