//! Filesystem-backed archive storage

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{
    ArchiveStorage, Result, StorageError, StorageMetrics, is_archive_name, validate_filename,
};

#[cfg(unix)]
const ARCHIVE_DIR_MODE: u32 = 0o700;
#[cfg(unix)]
const ARCHIVE_FILE_MODE: u32 = 0o600;

/// Archives stored as plain files under one canonical base directory
#[derive(Debug, Clone)]
pub struct LocalArchiveStorage {
    base: PathBuf,
}

impl LocalArchiveStorage {
    /// Create the base directory if needed and pin its canonical path
    pub fn new<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref();

        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(ARCHIVE_DIR_MODE);
        }
        builder.create(base)?;

        let base = base.canonicalize()?;
        info!(base = %base.display(), "Local archive storage ready");
        Ok(Self { base })
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    fn ensure_within_base(&self, path: &Path, filename: &str) -> Result<()> {
        if path.starts_with(&self.base) {
            Ok(())
        } else {
            Err(StorageError::PathTraversal(filename.to_string()))
        }
    }

    /// Resolve an existing archive, following symlinks before the base check
    async fn resolve_existing(&self, filename: &str) -> Result<PathBuf> {
        let relative = validate_filename(filename)?;
        let canonical = tokio::fs::canonicalize(self.base.join(relative))
            .await
            .map_err(|e| not_found_or_io(e, filename))?;

        self.ensure_within_base(&canonical, filename)?;
        Ok(canonical)
    }

    /// Resolve a write target, creating missing parent directories on demand
    async fn resolve_for_write(&self, filename: &str) -> Result<PathBuf> {
        let relative = validate_filename(filename)?;
        let target = self.base.join(relative);

        let (Some(parent), Some(file_name)) = (target.parent(), target.file_name()) else {
            return Err(StorageError::InvalidInput(filename.to_string()));
        };

        // Check the deepest existing ancestor first so a symlinked directory
        // cannot make us create directories outside the base.
        let mut existing = parent;
        while tokio::fs::metadata(existing).await.is_err() {
            match existing.parent() {
                Some(up) => existing = up,
                None => break,
            }
        }
        self.ensure_within_base(&tokio::fs::canonicalize(existing).await?, filename)?;

        if existing != parent {
            let mut builder = tokio::fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            builder.mode(ARCHIVE_DIR_MODE);
            builder.create(parent).await?;
        }

        let canonical_parent = tokio::fs::canonicalize(parent).await?;
        self.ensure_within_base(&canonical_parent, filename)?;
        Ok(canonical_parent.join(file_name))
    }
}

#[async_trait]
impl ArchiveStorage for LocalArchiveStorage {
    async fn save_archive(&self, filename: &str, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(StorageError::InvalidInput("data is required".to_string()));
        }

        let path = self.resolve_for_write(filename).await?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(ARCHIVE_FILE_MODE);

        let mut file = options.open(&path).await.map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => StorageError::AlreadyExists(filename.to_string()),
            _ => StorageError::Io(e),
        })?;
        file.write_all(data).await?;
        file.sync_all().await?;

        info!(filename, size = data.len(), "Saved archive");
        Ok(())
    }

    async fn list_archives(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.base).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_archive_name(name) {
                    files.push(name.to_string());
                }
            }
        }

        files.sort();
        Ok(files)
    }

    async fn get_archive(&self, filename: &str) -> Result<Vec<u8>> {
        let path = self.resolve_existing(filename).await?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| not_found_or_io(e, filename))?;

        debug!(filename, size = data.len(), "Read archive");
        Ok(data)
    }

    async fn delete_archive(&self, filename: &str) -> Result<()> {
        let path = self.resolve_existing(filename).await?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or_io(e, filename))?;

        info!(filename, "Deleted archive");
        Ok(())
    }

    async fn get_storage_metrics(&self) -> Result<StorageMetrics> {
        let mut entries = tokio::fs::read_dir(&self.base).await?;
        let mut metrics = StorageMetrics::default();

        while let Some(entry) = entries.next_entry().await? {
            let is_archive = entry.file_name().to_str().is_some_and(is_archive_name);
            if !is_archive {
                continue;
            }

            // Entries can disappear between read_dir and stat
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }

            let modified = meta.modified().ok().map(DateTime::<Utc>::from);
            metrics.record(meta.len(), modified);
        }

        Ok(metrics)
    }
}

fn not_found_or_io(err: std::io::Error, filename: &str) -> StorageError {
    match err.kind() {
        ErrorKind::NotFound => StorageError::NotFound(filename.to_string()),
        _ => StorageError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (LocalArchiveStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalArchiveStorage::new(temp_dir.path().join("archives")).unwrap();
        (storage, temp_dir)
    }

    #[tokio::test]
    async fn test_save_get_delete() {
        let (storage, _temp) = create_test_storage();

        storage
            .save_archive("logs-archive-20250101.json", b"[]")
            .await
            .unwrap();
        let data = storage.get_archive("logs-archive-20250101.json").await.unwrap();
        assert_eq!(data, b"[]");

        storage.delete_archive("logs-archive-20250101.json").await.unwrap();
        assert!(matches!(
            storage.get_archive("logs-archive-20250101.json").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_save_rejects_empty_input() {
        let (storage, _temp) = create_test_storage();

        assert!(matches!(
            storage.save_archive("", b"data").await,
            Err(StorageError::InvalidInput(_))
        ));
        assert!(matches!(
            storage.save_archive("a.json", b"").await,
            Err(StorageError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_traversal_rejected_for_every_operation() {
        let (storage, temp) = create_test_storage();
        std::fs::write(temp.path().join("outside.json"), b"secret").unwrap();

        for name in ["../outside.json", "nested/../../outside.json", "/etc/passwd"] {
            assert!(matches!(
                storage.save_archive(name, b"x").await,
                Err(StorageError::PathTraversal(_))
            ));
            assert!(matches!(
                storage.get_archive(name).await,
                Err(StorageError::PathTraversal(_))
            ));
            assert!(matches!(
                storage.delete_archive(name).await,
                Err(StorageError::PathTraversal(_))
            ));
        }

        assert!(temp.path().join("outside.json").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_rejected() {
        let (storage, temp) = create_test_storage();
        let outside = temp.path().join("elsewhere");
        std::fs::create_dir(&outside).unwrap();
        std::fs::write(outside.join("leak.json"), b"secret").unwrap();
        std::os::unix::fs::symlink(&outside, storage.base_path().join("link")).unwrap();

        assert!(matches!(
            storage.get_archive("link/leak.json").await,
            Err(StorageError::PathTraversal(_))
        ));
        assert!(matches!(
            storage.save_archive("link/new.json", b"x").await,
            Err(StorageError::PathTraversal(_))
        ));
        assert!(!outside.join("new.json").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_files_written_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (storage, _temp) = create_test_storage();
        storage.save_archive("perm.json", b"[]").await.unwrap();

        let mode = std::fs::metadata(storage.base_path().join("perm.json"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_save_creates_parent_directories() {
        let (storage, _temp) = create_test_storage();
        storage
            .save_archive("2025/01/logs-archive-20250101.json", b"[]")
            .await
            .unwrap();

        assert!(storage.base_path().join("2025/01/logs-archive-20250101.json").exists());
    }

    #[tokio::test]
    async fn test_existing_archive_not_overwritten() {
        let (storage, _temp) = create_test_storage();
        storage.save_archive("a.json", b"first").await.unwrap();

        assert!(matches!(
            storage.save_archive("a.json", b"second").await,
            Err(StorageError::AlreadyExists(_))
        ));
        assert_eq!(storage.get_archive("a.json").await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let (storage, _temp) = create_test_storage();
        storage.save_archive("logs-archive-20250105.json.gz", b"x").await.unwrap();
        storage.save_archive("logs-archive-20250101.json", b"x").await.unwrap();
        storage.save_archive("notes.txt", b"x").await.unwrap();
        storage.save_archive("sub/logs-archive-20250102.json", b"x").await.unwrap();

        let names = storage.list_archives().await.unwrap();
        assert_eq!(
            names,
            vec!["logs-archive-20250101.json", "logs-archive-20250105.json.gz"]
        );
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (storage, _temp) = create_test_storage();
        assert!(matches!(
            storage.delete_archive("missing.json").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_storage_metrics() {
        let (storage, _temp) = create_test_storage();

        let empty = storage.get_storage_metrics().await.unwrap();
        assert_eq!(empty, StorageMetrics::default());

        storage.save_archive("a.json", b"12345").await.unwrap();
        storage.save_archive("b.json.gz", b"123").await.unwrap();

        let metrics = storage.get_storage_metrics().await.unwrap();
        assert_eq!(metrics.total_archives, 2);
        assert_eq!(metrics.total_size_bytes, 8);
        assert!(metrics.oldest_archive.is_some());
        assert!(metrics.oldest_archive <= metrics.newest_archive);
    }
}
