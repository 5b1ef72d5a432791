//! The persistent index port.
//!
//! A durable mapping from item id to item record, plus the single persisted
//! delta cursor. Implemented by `odsync-cache` over SQLite.

use async_trait::async_trait;

use crate::domain::{DeltaToken, ItemRecord, RemoteId, SyncError};

/// Durable storage for the index and the delta cursor.
///
/// The engine owns the index exclusively for the duration of a pass; this
/// trait has no transaction or locking concept because nothing else writes
/// concurrently.
#[async_trait]
pub trait IndexPort: Send + Sync {
    /// Insert a new row, or replace the existing row with the same id.
    async fn insert_or_replace(&self, record: &ItemRecord) -> Result<(), SyncError>;

    /// Remove the row for `id`, if present. Not an error if it is absent.
    async fn delete(&self, id: &RemoteId) -> Result<(), SyncError>;

    /// Look up a row by its remote id.
    async fn lookup_by_id(&self, id: &RemoteId) -> Result<Option<ItemRecord>, SyncError>;

    /// Look up a row by its derived local path.
    async fn lookup_by_path(&self, path: &std::path::Path) -> Result<Option<ItemRecord>, SyncError>;

    /// Every row currently in the index, in no particular order.
    async fn enumerate_all(&self) -> Result<Vec<ItemRecord>, SyncError>;

    /// The persisted delta cursor, or `None` if no pass has completed yet
    /// (equivalent to the empty-string initial cursor).
    async fn get_cursor(&self) -> Result<Option<DeltaToken>, SyncError>;

    /// Persist `cursor`, overwriting whatever was stored before.
    async fn set_cursor(&self, cursor: &DeltaToken) -> Result<(), SyncError>;
}
