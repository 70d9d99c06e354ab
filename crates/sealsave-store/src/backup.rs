//! Rotating `.bak.N` copies of committed slot files
//!
//! `.bak.1` is the newest. Rotation shifts every backup up by one, drops the
//! one that would exceed `max_backups`, and copies the current file to
//! `.bak.1`.

use std::path::{Path, PathBuf};

use crate::error::{SaveError, SaveResult};
use crate::save_file::{read_header, tmp_path};

#[derive(Debug, Clone, Copy)]
pub struct BackupRotator {
    max_backups: u32,
}

impl BackupRotator {
    pub fn new(max_backups: u32) -> SaveResult<Self> {
        if max_backups == 0 {
            return Err(SaveError::Config("max_backups must be positive".into()));
        }
        Ok(Self { max_backups })
    }

    /// Copy `path` into the backup set. A missing `path` is a no-op.
    pub async fn rotate(&self, path: &Path) -> SaveResult<()> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(());
        }

        let oldest = backup_path(path, self.max_backups);
        remove_if_exists(&oldest).await?;
        for i in (1..self.max_backups).rev() {
            let from = backup_path(path, i);
            if tokio::fs::try_exists(&from).await? {
                tokio::fs::rename(&from, backup_path(path, i + 1)).await?;
            }
        }

        tokio::fs::copy(path, backup_path(path, 1)).await?;
        tracing::debug!(path = %path.display(), max = self.max_backups, "backups rotated");
        Ok(())
    }

    /// Existing backups of `path`, newest first.
    pub async fn backup_paths(&self, path: &Path) -> SaveResult<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for i in 1.. {
            let candidate = backup_path(path, i);
            if !tokio::fs::try_exists(&candidate).await? {
                break;
            }
            paths.push(candidate);
        }
        Ok(paths)
    }

    /// Atomically replace `path` with a copy of `backup`.
    async fn restore_from(&self, path: &Path, backup: &Path) -> SaveResult<()> {
        let tmp = tmp_path(path);
        let result: std::io::Result<()> = async {
            tokio::fs::copy(backup, &tmp).await?;
            tokio::fs::rename(&tmp, path).await
        }
        .await;
        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tracing::info!(path = %path.display(), backup = %backup.display(), "restored from backup");
        Ok(())
    }

    /// Restore the newest backup whose container header is valid.
    ///
    /// Returns the backup used, or `None` if no usable backup exists.
    pub async fn restore_latest(&self, path: &Path) -> SaveResult<Option<PathBuf>> {
        for backup in self.backup_paths(path).await? {
            match read_header(&backup).await {
                Ok(_) => {
                    self.restore_from(path, &backup).await?;
                    return Ok(Some(backup));
                }
                Err(e) => {
                    tracing::warn!(backup = %backup.display(), "skipping unusable backup: {e}");
                }
            }
        }
        Ok(None)
    }
}

/// `<path>.bak.<index>`
pub fn backup_path(path: &Path, index: u32) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(format!(".bak.{index}"));
    PathBuf::from(os)
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealsave_core::format::{build_flags, encode_header};
    use sealsave_core::EncryptionAlgorithm;

    async fn write(path: &Path, content: &str) {
        tokio::fs::write(path, content).await.unwrap();
    }

    async fn read(path: &Path) -> String {
        tokio::fs::read_to_string(path).await.unwrap()
    }

    fn container(version: u16, payload: &[u8]) -> Vec<u8> {
        let flags = build_flags(false, EncryptionAlgorithm::AesCbcHmac);
        let mut bytes = encode_header(version, flags).to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    #[tokio::test]
    async fn test_rotation_keeps_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.sav");
        let rotator = BackupRotator::new(2).unwrap();

        for content in ["one", "two", "three"] {
            write(&path, content).await;
            rotator.rotate(&path).await.unwrap();
        }

        let backups = rotator.backup_paths(&path).await.unwrap();
        assert_eq!(backups.len(), 2);
        assert_eq!(read(&backups[0]).await, "three");
        assert_eq!(read(&backups[1]).await, "two");
        assert!(!backup_path(&path, 3).exists());
    }

    #[tokio::test]
    async fn test_rotate_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.sav");
        let rotator = BackupRotator::new(3).unwrap();
        rotator.rotate(&path).await.unwrap();
        assert!(rotator.backup_paths(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_latest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.sav");
        let rotator = BackupRotator::new(3).unwrap();

        assert_eq!(rotator.restore_latest(&path).await.unwrap(), None);

        let good = container(1, b"good");
        tokio::fs::write(&path, &good).await.unwrap();
        rotator.rotate(&path).await.unwrap();
        write(&path, "corrupted").await;

        let used = rotator.restore_latest(&path).await.unwrap();
        assert_eq!(used, Some(backup_path(&path, 1)));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), good);
        assert!(!tmp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_restore_skips_invalid_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.sav");
        let rotator = BackupRotator::new(3).unwrap();

        let older = container(2, b"older");
        tokio::fs::write(&path, &older).await.unwrap();
        rotator.rotate(&path).await.unwrap();
        write(&path, "not a container").await;
        rotator.rotate(&path).await.unwrap();

        let used = rotator.restore_latest(&path).await.unwrap();
        assert_eq!(used, Some(backup_path(&path, 2)));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), older);
    }

    #[tokio::test]
    async fn test_restore_with_only_invalid_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.sav");
        let rotator = BackupRotator::new(2).unwrap();

        write(&path, "junk").await;
        rotator.rotate(&path).await.unwrap();
        write(&path, "current").await;

        assert_eq!(rotator.restore_latest(&path).await.unwrap(), None);
        assert_eq!(read(&path).await, "current");
    }

    #[test]
    fn test_zero_backups_rejected() {
        assert!(matches!(BackupRotator::new(0), Err(SaveError::Config(_))));
    }

    #[test]
    fn test_backup_path() {
        assert_eq!(
            backup_path(Path::new("/s/main.sav"), 2),
            PathBuf::from("/s/main.sav.bak.2")
        );
    }
}
