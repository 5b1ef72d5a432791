//! The local filesystem port.
//!
//! Implemented by `odsync-engine::fs::LocalFs` over `tokio::fs`, following
//! an `ILocalFileSystem`/`IFileObserver`/`WatchHandle` shape trimmed to what
//! the reconciliation engine itself needs (no FUSE inode bookkeeping, no
//! lock-state probing).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Crc32Hex, SyncError};

/// What the probe needs to know about a local path: whether it exists, and
/// if so, what kind of thing it is and when it was last modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalState {
    pub exists: bool,
    pub is_file: bool,
    pub is_dir: bool,
}

impl LocalState {
    #[must_use]
    pub const fn not_found() -> Self {
        Self {
            exists: false,
            is_file: false,
            is_dir: false,
        }
    }
}

/// Local filesystem operations the engine consumes.
#[async_trait]
pub trait LocalFsPort: Send + Sync {
    /// Probe the current state of `path` without reading its content.
    async fn state(&self, path: &Path) -> Result<LocalState, SyncError>;

    /// Last-modified instant of `path`, second-truncated by the caller.
    async fn mtime(&self, path: &Path) -> Result<DateTime<Utc>, SyncError>;

    /// CRC32 of `path`'s content.
    async fn compute_crc32(&self, path: &Path) -> Result<Crc32Hex, SyncError>;

    /// Write `content` to `path`, creating parent directories as needed.
    /// Atomic with respect to readers (write to a temp file, rename over).
    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), SyncError>;

    /// Read the full content of `path`.
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, SyncError>;

    /// Create `path` as a directory, including any missing parents.
    async fn create_dir(&self, path: &Path) -> Result<(), SyncError>;

    /// Remove a regular file.
    async fn remove_file(&self, path: &Path) -> Result<(), SyncError>;

    /// Remove an empty directory. Removing a non-empty directory is not
    /// treated as an error by the caller, but the port itself reports the
    /// underlying failure so the caller can decide.
    async fn remove_dir(&self, path: &Path) -> Result<(), SyncError>;

    /// Rename/move `from` to `to`, creating `to`'s parent directories as
    /// needed.
    async fn rename(&self, from: &Path, to: &Path) -> Result<(), SyncError>;

    /// Force `path`'s mtime to `instant` (used after every download/upload
    /// to align local state with the indexed row).
    async fn set_mtime(&self, path: &Path, instant: DateTime<Utc>) -> Result<(), SyncError>;
}

/// A single filesystem change, as emitted by the watcher in monitor mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    Renamed { old: PathBuf, new: PathBuf },
}

impl ChangeEvent {
    /// The path most relevant to this event (the new path for a rename).
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Created(p) | Self::Modified(p) | Self::Deleted(p) => p,
            Self::Renamed { new, .. } => new,
        }
    }
}

/// RAII handle for an active filesystem watch; dropping it stops the watch.
pub struct WatchHandle {
    stop_fn: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchHandle {
    #[must_use]
    pub fn new(stop_fn: Box<dyn FnOnce() + Send>) -> Self {
        Self {
            stop_fn: Some(stop_fn),
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(stop_fn) = self.stop_fn.take() {
            stop_fn();
        }
    }
}
