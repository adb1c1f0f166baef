//! Object-store-backed archive storage
//! Uses Apache Arrow object_store crate

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{ObjectStore, PutMode, PutOptions, path::Path as StoragePath};
use tracing::{debug, info};

use super::{
    ArchiveStorage, Result, StorageError, StorageMetrics, is_archive_name, validate_filename,
};

/// Archive storage over any object_store backend, scoped to a key prefix
#[derive(Clone)]
pub struct ObjectArchiveStorage {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl ObjectArchiveStorage {
    /// Wrap any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    /// In-memory storage for testing/development
    pub fn in_memory() -> Self {
        Self::new(Arc::new(object_store::memory::InMemory::new()), "")
    }

    /// S3 bucket; credentials are taken from the standard AWS environment
    pub fn s3(bucket: &str, region: Option<&str>, prefix: &str) -> Result<Self> {
        let mut builder =
            object_store::aws::AmazonS3Builder::from_env().with_bucket_name(bucket);
        if let Some(region) = region {
            builder = builder.with_region(region);
        }

        let store = builder.build()?;
        info!(bucket, prefix, "S3 archive storage ready");
        Ok(Self::new(Arc::new(store), prefix))
    }

    fn key(&self, filename: &str) -> Result<StoragePath> {
        validate_filename(filename)?;
        let raw = if self.prefix.is_empty() {
            filename.to_string()
        } else {
            format!("{}/{}", self.prefix, filename)
        };
        StoragePath::parse(raw).map_err(|_| StorageError::PathTraversal(filename.to_string()))
    }

    fn prefix_path(&self) -> Option<StoragePath> {
        (!self.prefix.is_empty()).then(|| StoragePath::from(self.prefix.as_str()))
    }
}

#[async_trait]
impl ArchiveStorage for ObjectArchiveStorage {
    async fn save_archive(&self, filename: &str, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(StorageError::InvalidInput("data is required".to_string()));
        }
        let path = self.key(filename)?;

        self.store
            .put_opts(
                &path,
                Bytes::copy_from_slice(data).into(),
                PutOptions::from(PutMode::Create),
            )
            .await
            .map_err(|e| map_store_error(e, filename))?;

        info!(key = %path, size = data.len(), "Uploaded archive");
        Ok(())
    }

    async fn list_archives(&self) -> Result<Vec<String>> {
        let listing = self
            .store
            .list_with_delimiter(self.prefix_path().as_ref())
            .await?;

        let mut names: Vec<String> = listing
            .objects
            .iter()
            .filter_map(|meta| meta.location.filename())
            .filter(|name| is_archive_name(name))
            .map(str::to_string)
            .collect();

        names.sort();
        Ok(names)
    }

    async fn get_archive(&self, filename: &str) -> Result<Vec<u8>> {
        let path = self.key(filename)?;

        let result = self
            .store
            .get(&path)
            .await
            .map_err(|e| map_store_error(e, filename))?;
        let bytes = result.bytes().await?;

        debug!(key = %path, size = bytes.len(), "Downloaded archive");
        Ok(bytes.to_vec())
    }

    async fn delete_archive(&self, filename: &str) -> Result<()> {
        let path = self.key(filename)?;

        // Some backends treat deleting a missing key as success
        self.store
            .head(&path)
            .await
            .map_err(|e| map_store_error(e, filename))?;
        self.store
            .delete(&path)
            .await
            .map_err(|e| map_store_error(e, filename))?;

        info!(key = %path, "Deleted archive");
        Ok(())
    }

    async fn get_storage_metrics(&self) -> Result<StorageMetrics> {
        let listing = self
            .store
            .list_with_delimiter(self.prefix_path().as_ref())
            .await?;

        let mut metrics = StorageMetrics::default();
        for meta in listing
            .objects
            .iter()
            .filter(|meta| meta.location.filename().is_some_and(is_archive_name))
        {
            metrics.record(meta.size as u64, Some(meta.last_modified));
        }

        Ok(metrics)
    }
}

fn map_store_error(err: object_store::Error, filename: &str) -> StorageError {
    match err {
        object_store::Error::NotFound { .. } => StorageError::NotFound(filename.to_string()),
        object_store::Error::AlreadyExists { .. } => {
            StorageError::AlreadyExists(filename.to_string())
        }
        other => StorageError::ObjectStore(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_and_listing() {
        let storage = ObjectArchiveStorage::in_memory();
        storage
            .save_archive("logs-archive-20250102.json.gz", b"b")
            .await
            .unwrap();
        storage
            .save_archive("logs-archive-20250101.json", b"a")
            .await
            .unwrap();
        storage.save_archive("other.bin", b"c").await.unwrap();

        assert_eq!(
            storage.list_archives().await.unwrap(),
            vec!["logs-archive-20250101.json", "logs-archive-20250102.json.gz"]
        );
        assert_eq!(
            storage.get_archive("logs-archive-20250101.json").await.unwrap(),
            b"a"
        );

        let metrics = storage.get_storage_metrics().await.unwrap();
        assert_eq!(metrics.total_archives, 2);
        assert_eq!(metrics.total_size_bytes, 2);
    }

    #[tokio::test]
    async fn test_prefix_scopes_keys() {
        let backend: Arc<dyn ObjectStore> = Arc::new(object_store::memory::InMemory::new());
        let archives = ObjectArchiveStorage::new(backend.clone(), "/archives/");
        let other = ObjectArchiveStorage::new(backend, "elsewhere");

        archives.save_archive("a.json", b"x").await.unwrap();
        assert_eq!(archives.list_archives().await.unwrap(), vec!["a.json"]);
        assert!(other.list_archives().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_and_duplicate_keys() {
        let storage = ObjectArchiveStorage::in_memory();

        assert!(matches!(
            storage.get_archive("missing.json").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.delete_archive("missing.json").await,
            Err(StorageError::NotFound(_))
        ));

        storage.save_archive("a.json", b"x").await.unwrap();
        assert!(matches!(
            storage.save_archive("a.json", b"y").await,
            Err(StorageError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let storage = ObjectArchiveStorage::in_memory();
        assert!(matches!(
            storage.save_archive("../a.json", b"x").await,
            Err(StorageError::PathTraversal(_))
        ));
        assert!(matches!(
            storage.get_archive("/abs.json").await,
            Err(StorageError::PathTraversal(_))
        ));
    }
}
