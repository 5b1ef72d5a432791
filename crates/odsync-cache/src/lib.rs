//! odsync-cache — SQLite-backed persistent index
//!
//! Implements `odsync_core::ports::IndexPort` over `sqlx` + SQLite:
//! - Item records (the synchronizer's durable index)
//! - The persisted delta cursor

pub mod index;
pub mod pool;

pub use index::SqliteIndex;
pub use pool::DatabasePool;

use thiserror::Error;

/// Errors raised by the persistence layer itself (connection, migration,
/// row decoding). Translated to `odsync_core::domain::SyncError` at the
/// port boundary.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("failed to run database migrations: {0}")]
    MigrationFailed(String),

    #[error("failed to decode row: {0}")]
    SerializationError(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
}

impl From<CacheError> for odsync_core::domain::SyncError {
    fn from(err: CacheError) -> Self {
        odsync_core::domain::SyncError::Storage(anyhow::anyhow!(err))
    }
}
