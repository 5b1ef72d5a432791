//! `LocalFsPort` implementation over `tokio::fs`.
//!
//! Atomic writes via write-to-temp-then-rename, async stat for state,
//! `tokio::fs` throughout. There's no quickXorHash or lock-detection here;
//! content identity is CRC32 ([`Crc32Hex::of`]), the same hash the remote
//! delta feed reports.

use std::io::ErrorKind;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use odsync_core::domain::{Crc32Hex, SyncError};
use odsync_core::ports::{LocalFsPort, LocalState};
use std::path::Path;

/// Stateless adapter; every operation derives its context from the `Path`
/// argument.
#[derive(Debug, Clone, Default)]
pub struct LocalFs;

impl LocalFs {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn fs_err(path: &Path, source: std::io::Error) -> SyncError {
    SyncError::Filesystem {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl LocalFsPort for LocalFs {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn state(&self, path: &Path) -> Result<LocalState, SyncError> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) => Ok(LocalState {
                exists: true,
                is_file: metadata.is_file(),
                is_dir: metadata.is_dir(),
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(LocalState::not_found()),
            Err(err) => Err(fs_err(path, err)),
        }
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn mtime(&self, path: &Path) -> Result<DateTime<Utc>, SyncError> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| fs_err(path, e))?;
        let modified = metadata.modified().map_err(|e| fs_err(path, e))?;
        let duration = modified
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Ok(DateTime::from_timestamp(duration.as_secs() as i64, duration.subsec_nanos())
            .unwrap_or_else(Utc::now))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn compute_crc32(&self, path: &Path) -> Result<Crc32Hex, SyncError> {
        let data = tokio::fs::read(path).await.map_err(|e| fs_err(path, e))?;
        Ok(Crc32Hex::of(&data))
    }

    #[instrument(skip(self, content), fields(path = %path.display(), bytes = content.len()))]
    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), SyncError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| fs_err(parent, e))?;
        }

        let tmp_path = {
            let mut p = path.as_os_str().to_owned();
            p.push(".tmp");
            std::path::PathBuf::from(p)
        };

        debug!(?tmp_path, "writing to temporary file");
        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|e| fs_err(&tmp_path, e))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| fs_err(path, e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, SyncError> {
        tokio::fs::read(path).await.map_err(|e| fs_err(path, e))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn create_dir(&self, path: &Path) -> Result<(), SyncError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| fs_err(path, e))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn remove_file(&self, path: &Path) -> Result<(), SyncError> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| fs_err(path, e))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn remove_dir(&self, path: &Path) -> Result<(), SyncError> {
        tokio::fs::remove_dir(path)
            .await
            .map_err(|e| fs_err(path, e))
    }

    #[instrument(skip(self), fields(from = %from.display(), to = %to.display()))]
    async fn rename(&self, from: &Path, to: &Path) -> Result<(), SyncError> {
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| fs_err(parent, e))?;
        }
        tokio::fs::rename(from, to).await.map_err(|e| fs_err(to, e))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn set_mtime(&self, path: &Path, instant: DateTime<Utc>) -> Result<(), SyncError> {
        let system_time: std::time::SystemTime = instant.into();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || filetime::set_file_mtime(&path, system_time.into()))
            .await
            .map_err(|e| SyncError::Filesystem {
                path: "set_mtime".to_string(),
                source: std::io::Error::new(ErrorKind::Other, e),
            })?
            .map_err(|e| SyncError::Filesystem {
                path: "set_mtime".to_string(),
                source: e,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn read_write_roundtrip() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFs::new();
        let path = dir.path().join("hello.txt");

        fs.write_file(&path, b"hello").await.unwrap();
        let data = fs.read_file(&path).await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFs::new();
        let path = dir.path().join("a/b/c.txt");

        fs.write_file(&path, b"nested").await.unwrap();
        let data = fs.read_file(&path).await.unwrap();
        assert_eq!(data, b"nested");
    }

    #[tokio::test]
    async fn state_reports_not_found() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFs::new();
        let state = fs.state(&dir.path().join("missing")).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn state_distinguishes_file_and_dir() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFs::new();
        let file_path = dir.path().join("f.txt");
        let dir_path = dir.path().join("d");

        fs.write_file(&file_path, b"x").await.unwrap();
        fs.create_dir(&dir_path).await.unwrap();

        let file_state = fs.state(&file_path).await.unwrap();
        assert!(file_state.is_file && !file_state.is_dir);

        let dir_state = fs.state(&dir_path).await.unwrap();
        assert!(dir_state.is_dir && !dir_state.is_file);
    }

    #[tokio::test]
    async fn compute_crc32_matches_known_value() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFs::new();
        let path = dir.path().join("crc.txt");
        fs.write_file(&path, b"hello world").await.unwrap();

        let hash = fs.compute_crc32(&path).await.unwrap();
        assert_eq!(hash, Crc32Hex::of(b"hello world"));
    }

    #[tokio::test]
    async fn rename_moves_file_and_creates_parent() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFs::new();
        let from = dir.path().join("a.txt");
        let to = dir.path().join("sub/b.txt");

        fs.write_file(&from, b"data").await.unwrap();
        fs.rename(&from, &to).await.unwrap();

        assert!(!fs.state(&from).await.unwrap().exists);
        assert_eq!(fs.read_file(&to).await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn remove_dir_fails_on_non_empty_directory() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFs::new();
        let sub = dir.path().join("sub");
        fs.create_dir(&sub).await.unwrap();
        fs.write_file(&sub.join("f.txt"), b"x").await.unwrap();

        assert!(fs.remove_dir(&sub).await.is_err());
    }

    #[tokio::test]
    async fn set_mtime_then_mtime_round_trips_to_the_second() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFs::new();
        let path = dir.path().join("m.txt");
        fs.write_file(&path, b"x").await.unwrap();

        let target = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        fs.set_mtime(&path, target).await.unwrap();

        let observed = fs.mtime(&path).await.unwrap();
        assert_eq!(observed.timestamp(), target.timestamp());
    }
}
