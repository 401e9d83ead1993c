//! Temporary on-disk copy of an uploaded file.
//!
//! A [`StagedUpload`] owns `TEMP_PATH/<filename>` for as long as it lives:
//! it holds the per-filename lock, and removes the file either through
//! [`StagedUpload::remove`] or, if the request future is dropped early, in
//! `Drop`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::utils::keyed_mutex::KeyedMutex;

#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    written: bool,
    removed: bool,
    _lock: OwnedMutexGuard<()>,
}

impl StagedUpload {
    /// Stages `content` at `dir/filename`.
    ///
    /// The write uses create-exclusive semantics: a file already present at
    /// that path is left untouched and reused. `filename` must already be
    /// validated as a bare file name.
    pub async fn stage(
        locks: &KeyedMutex,
        dir: &Path,
        filename: &str,
        content: &[u8],
    ) -> std::io::Result<Self> {
        fs::create_dir_all(dir).await?;

        let path = dir.join(filename);
        let lock = locks.lock(&path.to_string_lossy()).await;
        let mut staged = Self {
            path,
            written: false,
            removed: false,
            _lock: lock,
        };

        if let Err(e) = staged.write(content).await {
            staged.remove().await;
            return Err(e);
        }
        Ok(staged)
    }

    async fn write(&mut self, content: &[u8]) -> std::io::Result<()> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                info!(
                    "♻️  {} already staged, reusing it",
                    self.path.display()
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        file.write_all(content).await?;
        file.flush().await?;
        self.written = true;
        debug!("Staged {} bytes at {}", content.len(), self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this request wrote the file (false when an existing one was reused).
    pub fn written(&self) -> bool {
        self.written
    }

    /// Removes the staged file if it is still a regular file. Failures are
    /// logged, never returned.
    pub async fn remove(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;

        match fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() => {
                if let Err(e) = fs::remove_file(&self.path).await {
                    warn!("Failed to remove staged file {}: {}", self.path.display(), e);
                }
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to inspect staged file {}: {}", self.path.display(), e),
        }
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if std::fs::metadata(&self.path).is_ok_and(|meta| meta.is_file()) {
            warn!(
                "Staged file {} dropped without cleanup, removing it",
                self.path.display()
            );
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("Failed to remove staged file {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stage_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let locks = KeyedMutex::new();

        let mut staged = StagedUpload::stage(&locks, dir.path(), "a.xlsx", b"data")
            .await
            .unwrap();
        assert!(staged.written());
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"data");

        staged.remove().await;
        assert!(!dir.path().join("a.xlsx").exists());
    }

    #[tokio::test]
    async fn test_existing_file_is_reused_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.xlsx");
        std::fs::write(&path, b"already here").unwrap();

        let locks = KeyedMutex::new();
        let mut staged = StagedUpload::stage(&locks, dir.path(), "a.xlsx", b"new bytes")
            .await
            .unwrap();
        assert!(!staged.written());
        assert_eq!(std::fs::read(&path).unwrap(), b"already here");

        staged.remove().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let locks = KeyedMutex::new();

        let staged = StagedUpload::stage(&locks, dir.path(), "dropped.xlsx", b"x")
            .await
            .unwrap();
        let path = staged.path().to_path_buf();
        drop(staged);

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("uploads").join("tmp");
        let locks = KeyedMutex::new();

        let mut staged = StagedUpload::stage(&locks, &nested, "a.xlsx", b"x")
            .await
            .unwrap();
        assert!(nested.join("a.xlsx").is_file());
        staged.remove().await;
    }

    #[tokio::test]
    async fn test_same_name_waits_for_previous_upload() {
        let dir = tempfile::tempdir().unwrap();
        let locks = KeyedMutex::new();

        let mut first = StagedUpload::stage(&locks, dir.path(), "same.xlsx", b"first")
            .await
            .unwrap();

        let contender = locks.clone();
        let base = dir.path().to_path_buf();
        let second = tokio::spawn(async move {
            let mut staged = StagedUpload::stage(&contender, &base, "same.xlsx", b"second")
                .await
                .unwrap();
            let content = std::fs::read(staged.path()).unwrap();
            staged.remove().await;
            content
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!second.is_finished());
        assert_eq!(std::fs::read(first.path()).unwrap(), b"first");

        first.remove().await;
        drop(first);

        assert_eq!(second.await.unwrap(), b"second");
        assert!(!dir.path().join("same.xlsx").exists());
    }
}
