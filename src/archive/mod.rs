//! Cold storage for compressed archive blobs
//!
//! [`ArchiveStorage`] is the byte-level contract the retention service writes
//! through. Two backends implement it:
//! - [`LocalArchiveStorage`] keeps files under one base directory
//! - [`ObjectArchiveStorage`] wraps any `object_store` backend (S3, in-memory)
//!
//! Filenames are validated before any I/O: only plain relative components are
//! accepted, so `../x`, `/etc/passwd` or `a/./b` never reach the backend.

pub mod local;
pub mod object;

use std::path::{Component, Path};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::config::{ArchiveStorageType, RetentionConfig};
use crate::humanize::ByteSize;

pub use local::LocalArchiveStorage;
pub use object::ObjectArchiveStorage;

/// Extensions recognized as archives when listing
pub const ARCHIVE_EXTENSIONS: &[&str] = &["gz", "json"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Path traversal rejected: {0}")]
    PathTraversal(String),

    #[error("Archive not found: {0}")]
    NotFound(String),

    #[error("Archive already exists: {0}")]
    AlreadyExists(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Usage statistics, recomputed on every call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageMetrics {
    pub total_archives: u64,
    pub total_size_bytes: u64,
    pub oldest_archive: Option<DateTime<Utc>>,
    pub newest_archive: Option<DateTime<Utc>>,
}

impl StorageMetrics {
    /// Fold one archive's size and modification time into the totals
    pub fn record(&mut self, size: u64, modified: Option<DateTime<Utc>>) {
        self.total_archives += 1;
        self.total_size_bytes += size;

        if let Some(modified) = modified {
            if self.oldest_archive.is_none_or(|oldest| modified < oldest) {
                self.oldest_archive = Some(modified);
            }
            if self.newest_archive.is_none_or(|newest| modified > newest) {
                self.newest_archive = Some(modified);
            }
        }
    }

    pub fn total_size(&self) -> ByteSize {
        ByteSize(self.total_size_bytes)
    }
}

/// Byte-level persistence for archive blobs
#[async_trait]
pub trait ArchiveStorage: Send + Sync {
    async fn save_archive(&self, filename: &str, data: &[u8]) -> Result<()>;

    /// All archive names, sorted lexically
    async fn list_archives(&self) -> Result<Vec<String>>;

    async fn get_archive(&self, filename: &str) -> Result<Vec<u8>>;

    async fn delete_archive(&self, filename: &str) -> Result<()>;

    async fn get_storage_metrics(&self) -> Result<StorageMetrics>;
}

/// Build the backend selected by the retention config
pub fn from_config(config: &RetentionConfig) -> Result<Arc<dyn ArchiveStorage>> {
    match config.storage_type {
        ArchiveStorageType::Local => Ok(Arc::new(LocalArchiveStorage::new(
            &config.local_archive_path,
        )?)),
        ArchiveStorageType::Remote => {
            let bucket = config
                .remote_bucket
                .as_deref()
                .filter(|bucket| !bucket.trim().is_empty())
                .ok_or_else(|| StorageError::InvalidInput("remote bucket is required".into()))?;
            Ok(Arc::new(ObjectArchiveStorage::s3(
                bucket,
                config.remote_region.as_deref(),
                &config.remote_prefix,
            )?))
        }
    }
}

/// Reject empty names and anything that is not a chain of plain components
pub(crate) fn validate_filename(filename: &str) -> Result<&Path> {
    if filename.is_empty() {
        return Err(StorageError::InvalidInput("filename is required".to_string()));
    }
    if filename.contains('\0') {
        return Err(StorageError::InvalidInput(
            "filename contains a NUL byte".to_string(),
        ));
    }

    // Path::components normalizes away interior `.` and repeated separators,
    // so the raw segments are checked as well.
    let path = Path::new(filename);
    let plain_segments = filename
        .split('/')
        .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    let plain_components = path
        .components()
        .all(|component| matches!(component, Component::Normal(_)));

    if !plain_segments || !plain_components {
        return Err(StorageError::PathTraversal(filename.to_string()));
    }

    Ok(path)
}

/// Whether a name carries one of the recognized archive extensions
pub fn is_archive_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ARCHIVE_EXTENSIONS.contains(&ext))
}
