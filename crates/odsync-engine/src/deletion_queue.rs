//! Child-before-parent deletion queue, collected during a download pass and
//! drained once it finishes.

use std::path::PathBuf;

use tracing::info;

use odsync_core::domain::SyncError;
use odsync_core::ports::LocalFsPort;

/// Paths queued for local removal, drained in reverse of insertion order so
/// a directory's children (enqueued after their parent, since the delta
/// feed lists a folder before what it contains) are removed before the
/// directory itself is attempted.
#[derive(Debug, Default)]
pub struct DeletionQueue(Vec<PathBuf>);

impl DeletionQueue {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, path: PathBuf) {
        self.0.push(path);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[PathBuf] {
        &self.0
    }

    /// Drain every queued path. A file that still exists is removed
    /// outright; a directory is rmdir'd best-effort, since one the user has
    /// repopulated locally since the remote deletion should survive.
    pub async fn drain(&mut self, fs: &dyn LocalFsPort) -> Result<(), SyncError> {
        while let Some(path) = self.0.pop() {
            let state = fs.state(&path).await?;
            if !state.exists {
                continue;
            }

            if state.is_dir {
                match fs.remove_dir(&path).await {
                    Ok(()) => info!(path = %path.display(), "deleted dir"),
                    Err(_) => info!(path = %path.display(), "kept dir"),
                }
            } else {
                fs.remove_file(&path).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn drains_in_reverse_of_insertion_order() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFs::new();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs.write_file(&a, b"a").await.unwrap();
        fs.write_file(&b, b"b").await.unwrap();

        let mut queue = DeletionQueue::new();
        queue.push(a.clone());
        queue.push(b.clone());
        queue.drain(&fs).await.unwrap();

        assert!(!fs.state(&a).await.unwrap().exists);
        assert!(!fs.state(&b).await.unwrap().exists);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn missing_path_is_silently_skipped() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFs::new();
        let mut queue = DeletionQueue::new();
        queue.push(dir.path().join("never-existed.txt"));

        queue.drain(&fs).await.unwrap();
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn non_empty_directory_is_kept_not_an_error() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFs::new();
        let sub = dir.path().join("sub");
        fs.create_dir(&sub).await.unwrap();
        fs.write_file(&sub.join("kept.txt"), b"x").await.unwrap();

        let mut queue = DeletionQueue::new();
        queue.push(sub.clone());
        queue.drain(&fs).await.unwrap();

        assert!(fs.state(&sub).await.unwrap().exists);
    }

    #[tokio::test]
    async fn empty_directory_is_removed() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFs::new();
        let sub = dir.path().join("sub");
        fs.create_dir(&sub).await.unwrap();

        let mut queue = DeletionQueue::new();
        queue.push(sub.clone());
        queue.drain(&fs).await.unwrap();

        assert!(!fs.state(&sub).await.unwrap().exists);
    }
}
