use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use super::codec::{archive_filename, decode_archive, encode_archive, parse_archive_date};
use super::error::{RetentionError, Result};
use crate::AnyError;
use crate::archive::{ArchiveStorage, StorageError, StorageMetrics};
use crate::config::{RetentionConfig, ValidationError};
use crate::models::LogEntry;
use crate::observability::Metrics;
use crate::scheduler::{Job, job_fn};
use crate::store::LogRepository;

pub const RETENTION_JOB_NAME: &str = "log-retention";
pub const RETENTION_JOB_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Applies the retention policy to the live store
///
/// With archival enabled, a cleanup run works through the expired entries in
/// batches of at most `batch_limit`: each batch is written to one archive and
/// then exactly those entries are deleted. Rows that expire while a run is in
/// progress are left for the next run.
pub struct RetentionService {
    config: RetentionConfig,
    repository: Arc<dyn LogRepository>,
    storage: Arc<dyn ArchiveStorage>,
    metrics: Arc<Metrics>,
    archive_seq: AtomicU64,
}

impl RetentionService {
    pub fn new(
        config: RetentionConfig,
        repository: Arc<dyn LogRepository>,
        storage: Arc<dyn ArchiveStorage>,
    ) -> Result<Self> {
        Self::with_metrics(config, repository, storage, Arc::new(Metrics::new()))
    }

    pub fn with_metrics(
        config: RetentionConfig,
        repository: Arc<dyn LogRepository>,
        storage: Arc<dyn ArchiveStorage>,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            repository,
            storage,
            metrics,
            archive_seq: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    fn cutoff(&self) -> Result<DateTime<Utc>> {
        let days = self.config.retention_days;
        chrono::Duration::try_days(days)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or(RetentionError::InvalidConfig(
                ValidationError::InvalidRetentionDays(days),
            ))
    }

    /// Delete (and, if enabled, first archive) entries past the retention window
    pub async fn cleanup_old_logs(&self) -> Result<u64> {
        let result = match self.cutoff() {
            Ok(cutoff) => self.run_cleanup(cutoff).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(deleted) => self.metrics.cleanup_succeeded(*deleted),
            Err(_) => self.metrics.cleanup_failed(),
        }
        result
    }

    async fn run_cleanup(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        if !self.config.archive_enabled {
            let deleted = self.repository.delete_entries_older_than(cutoff).await?;
            info!(deleted, %cutoff, "Deleted expired logs");
            return Ok(deleted);
        }

        let mut deleted = 0u64;
        let mut archives = 0usize;

        loop {
            let batch = self
                .repository
                .get_entries_for_archival(cutoff, self.config.batch_limit)
                .await?;
            if batch.is_empty() {
                break;
            }

            let filename = self.archive_logs(&batch).await?;
            let removed = self.repository.delete_entries(&batch).await?;
            deleted += removed;
            archives += 1;
            debug!(%filename, archived = batch.len(), deleted = removed, "Archived batch");

            if batch.len() < self.config.batch_limit {
                break;
            }
            if removed == 0 {
                warn!(%filename, "Archived batch was already gone from the store");
                break;
            }
        }

        if archives == 0 {
            debug!(%cutoff, "No expired logs to archive");
        } else {
            info!(archives, deleted, %cutoff, "Archived and deleted expired logs");
        }
        Ok(deleted)
    }

    /// Number of entries a cleanup run would consider right now
    pub async fn preview_cleanup(&self) -> Result<u64> {
        let cutoff = self.cutoff()?;
        Ok(self.repository.count_entries_older_than(cutoff).await?)
    }

    /// Encode a batch and write it to storage, returning the archive name
    pub async fn archive_logs(&self, entries: &[LogEntry]) -> Result<String> {
        if entries.is_empty() {
            return Err(RetentionError::EmptyBatch);
        }

        let compress = self.config.archive_compression_enabled;
        let data = encode_archive(entries, compress)
            .map_err(|e| RetentionError::Archival(StorageError::Io(e)))?;
        let sequence = self.archive_seq.fetch_add(1, Ordering::Relaxed);
        let filename = archive_filename(Utc::now(), sequence, compress);

        self.storage
            .save_archive(&filename, &data)
            .await
            .map_err(RetentionError::Archival)?;

        self.metrics.archive_written();
        info!(%filename, entries = entries.len(), size = data.len(), "Wrote archive");
        Ok(filename)
    }

    pub async fn restore_from_archive(&self, filename: &str) -> Result<Vec<LogEntry>> {
        let data = self.storage.get_archive(filename).await.map_err(|e| match e {
            StorageError::NotFound(name) => RetentionError::NotFound(name),
            other => RetentionError::Archival(other),
        })?;

        let entries = decode_archive(&data).map_err(|reason| RetentionError::CorruptArchive {
            filename: filename.to_string(),
            reason,
        })?;

        info!(filename, entries = entries.len(), "Restored archive");
        Ok(entries)
    }

    pub async fn list_archives(&self) -> Result<Vec<String>> {
        self.storage
            .list_archives()
            .await
            .map_err(RetentionError::Archival)
    }

    /// Archive names whose date falls within `[start, end]`, sorted
    pub async fn search_archives(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<String>> {
        let names = self.list_archives().await?;

        let mut matches: Vec<String> = names
            .into_iter()
            .filter(|name| {
                parse_archive_date(name).is_some_and(|date| date >= start && date <= end)
            })
            .collect();
        matches.sort();

        debug!(%start, %end, found = matches.len(), "Searched archives");
        Ok(matches)
    }

    pub async fn get_metrics(&self) -> Result<StorageMetrics> {
        self.storage
            .get_storage_metrics()
            .await
            .map_err(RetentionError::Archival)
    }

    /// Daily job running [`cleanup_old_logs`](Self::cleanup_old_logs)
    pub fn create_retention_job(self: &Arc<Self>) -> Job {
        let service = Arc::clone(self);
        Job::builder()
            .name(RETENTION_JOB_NAME)
            .interval(RETENTION_JOB_INTERVAL)
            .action(job_fn(move |_token| {
                let service = Arc::clone(&service);
                async move {
                    let deleted = service.cleanup_old_logs().await?;
                    info!(job = RETENTION_JOB_NAME, deleted, "Retention run finished");
                    Ok::<(), AnyError>(())
                }
            }))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ObjectArchiveStorage;
    use crate::models::NewLogEntry;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory rows plus a log of every repository call
    #[derive(Default)]
    struct MockRepository {
        entries: Mutex<Vec<LogEntry>>,
        delete_result: u64,
        fail_fetch: bool,
        calls: Mutex<Vec<String>>,
        delete_cutoffs: Mutex<Vec<DateTime<Utc>>>,
    }

    impl MockRepository {
        fn with_entries(entries: Vec<LogEntry>) -> Self {
            Self {
                entries: Mutex::new(entries),
                ..Default::default()
            }
        }

        fn remaining(&self) -> usize {
            self.entries.lock().len()
        }
    }

    #[async_trait]
    impl LogRepository for MockRepository {
        async fn delete_entries_older_than(
            &self,
            cutoff: DateTime<Utc>,
        ) -> crate::store::Result<u64> {
            self.calls.lock().push("delete".to_string());
            self.delete_cutoffs.lock().push(cutoff);
            Ok(self.delete_result)
        }

        async fn get_entries_for_archival(
            &self,
            cutoff: DateTime<Utc>,
            limit: usize,
        ) -> crate::store::Result<Vec<LogEntry>> {
            self.calls.lock().push("fetch".to_string());
            if self.fail_fetch {
                return Err(StoreError::Backend("fetch failed".to_string()));
            }
            Ok(self
                .entries
                .lock()
                .iter()
                .filter(|entry| entry.timestamp < cutoff)
                .take(limit)
                .cloned()
                .collect())
        }

        async fn count_entries_older_than(
            &self,
            cutoff: DateTime<Utc>,
        ) -> crate::store::Result<u64> {
            self.calls.lock().push("count".to_string());
            let entries = self.entries.lock();
            Ok(entries.iter().filter(|entry| entry.timestamp < cutoff).count() as u64)
        }

        async fn delete_entries(&self, batch: &[LogEntry]) -> crate::store::Result<u64> {
            self.calls.lock().push("delete_entries".to_string());
            let mut entries = self.entries.lock();
            let before = entries.len();
            entries.retain(|entry| !batch.iter().any(|archived| archived.id == entry.id));
            Ok((before - entries.len()) as u64)
        }
    }

    /// Storage double that counts calls and can refuse writes
    #[derive(Default)]
    struct MockStorage {
        inner: Option<ObjectArchiveStorage>,
        fail_save: bool,
        calls: AtomicUsize,
    }

    impl MockStorage {
        fn working() -> Self {
            Self {
                inner: Some(ObjectArchiveStorage::in_memory()),
                ..Default::default()
            }
        }

        fn backend(&self) -> crate::archive::Result<&ObjectArchiveStorage> {
            self.inner
                .as_ref()
                .ok_or_else(|| StorageError::InvalidInput("no backend".to_string()))
        }
    }

    #[async_trait]
    impl ArchiveStorage for MockStorage {
        async fn save_archive(&self, filename: &str, data: &[u8]) -> crate::archive::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_save {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.backend()?.save_archive(filename, data).await
        }

        async fn list_archives(&self) -> crate::archive::Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.backend()?.list_archives().await
        }

        async fn get_archive(&self, filename: &str) -> crate::archive::Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.backend()?.get_archive(filename).await
        }

        async fn delete_archive(&self, filename: &str) -> crate::archive::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.backend()?.delete_archive(filename).await
        }

        async fn get_storage_metrics(&self) -> crate::archive::Result<StorageMetrics> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.backend()?.get_storage_metrics().await
        }
    }

    fn old_entry(id: u64, days_ago: i64) -> LogEntry {
        NewLogEntry::new("review", "INFO", format!("entry {id}"))
            .at(Utc::now() - chrono::Duration::days(days_ago))
            .into_entry(id)
    }

    fn archiving_config() -> RetentionConfig {
        RetentionConfig {
            archive_enabled: true,
            archive_compression_enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        for days in [0, -5, 200_000_000, i64::MAX] {
            let config = RetentionConfig {
                retention_days: days,
                ..Default::default()
            };
            let result = RetentionService::new(
                config,
                Arc::new(MockRepository::default()),
                Arc::new(MockStorage::default()),
            );
            assert!(matches!(result, Err(RetentionError::InvalidConfig(_))));
        }
    }

    #[tokio::test]
    async fn test_cleanup_without_archival_only_deletes() {
        let repository = Arc::new(MockRepository {
            delete_result: 1000,
            ..Default::default()
        });
        let storage = Arc::new(MockStorage::default());
        let service =
            RetentionService::new(RetentionConfig::default(), repository.clone(), storage.clone())
                .unwrap();

        assert_eq!(service.cleanup_old_logs().await.unwrap(), 1000);
        assert_eq!(storage.calls.load(Ordering::SeqCst), 0);
        assert_eq!(*repository.calls.lock(), vec!["delete"]);

        // Cutoff is roughly 90 days back
        let cutoff = repository.delete_cutoffs.lock()[0];
        let age = Utc::now() - cutoff;
        assert!(age >= chrono::Duration::days(90));
        assert!(age < chrono::Duration::days(90) + chrono::Duration::minutes(1));
    }

    #[tokio::test]
    async fn test_cleanup_archives_before_delete() {
        let batch = vec![old_entry(1, 120), old_entry(2, 100)];
        let repository = Arc::new(MockRepository::with_entries(
            [batch.clone(), vec![old_entry(3, 10)]].concat(),
        ));
        let storage = Arc::new(MockStorage::working());
        let service =
            RetentionService::new(archiving_config(), repository.clone(), storage.clone())
                .unwrap();

        assert_eq!(service.cleanup_old_logs().await.unwrap(), 2);
        assert_eq!(*repository.calls.lock(), vec!["fetch", "delete_entries"]);
        assert_eq!(repository.remaining(), 1);

        let today = Utc::now().date_naive();
        let archives = service.search_archives(today, today).await.unwrap();
        assert_eq!(archives.len(), 1);
        assert!(archives[0].starts_with("logs-archive-"));
        assert!(archives[0].ends_with(".json.gz"));

        let restored = service.restore_from_archive(&archives[0]).await.unwrap();
        assert_eq!(restored, batch);
    }

    #[tokio::test]
    async fn test_failed_archive_skips_delete() {
        let repository = Arc::new(MockRepository::with_entries(vec![old_entry(1, 120)]));
        let storage = Arc::new(MockStorage {
            fail_save: true,
            ..MockStorage::working()
        });
        let metrics = Arc::new(Metrics::new());
        let service = RetentionService::with_metrics(
            archiving_config(),
            repository.clone(),
            storage,
            metrics.clone(),
        )
        .unwrap();

        assert!(matches!(
            service.cleanup_old_logs().await,
            Err(RetentionError::Archival(_))
        ));
        assert_eq!(*repository.calls.lock(), vec!["fetch"]);
        assert_eq!(repository.remaining(), 1);
        assert_eq!(metrics.snapshot().cleanup_failures, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_repository_error() {
        let repository = Arc::new(MockRepository {
            fail_fetch: true,
            ..Default::default()
        });
        let service =
            RetentionService::new(archiving_config(), repository, Arc::new(MockStorage::working()))
                .unwrap();

        assert!(matches!(
            service.cleanup_old_logs().await,
            Err(RetentionError::Repository(_))
        ));
    }

    #[tokio::test]
    async fn test_backlog_drains_in_one_run() {
        let backlog: Vec<LogEntry> = (0..25).map(|id| old_entry(id, 200 - id as i64)).collect();
        let repository = Arc::new(MockRepository::with_entries(backlog));
        let config = RetentionConfig {
            batch_limit: 10,
            ..archiving_config()
        };
        let service =
            RetentionService::new(config, repository.clone(), Arc::new(MockStorage::working()))
                .unwrap();

        assert_eq!(service.cleanup_old_logs().await.unwrap(), 25);
        assert_eq!(repository.remaining(), 0);
        assert!(repository.delete_cutoffs.lock().is_empty());

        let archives = service.list_archives().await.unwrap();
        assert_eq!(archives.len(), 3);

        let mut ids = Vec::new();
        for name in &archives {
            ids.extend(service.restore_from_archive(name).await.unwrap().iter().map(|e| e.id));
        }
        ids.sort();
        assert_eq!(ids, (0..25).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_exact_multiple_of_batch_limit_ends_on_empty_fetch() {
        let repository = Arc::new(MockRepository::with_entries(
            (0..4).map(|id| old_entry(id, 120)).collect(),
        ));
        let config = RetentionConfig {
            batch_limit: 2,
            ..archiving_config()
        };
        let service =
            RetentionService::new(config, repository.clone(), Arc::new(MockStorage::working()))
                .unwrap();

        assert_eq!(service.cleanup_old_logs().await.unwrap(), 4);
        assert_eq!(
            *repository.calls.lock(),
            vec!["fetch", "delete_entries", "fetch", "delete_entries", "fetch"]
        );
    }

    #[tokio::test]
    async fn test_empty_expired_set_touches_nothing() {
        let repository = Arc::new(MockRepository::default());
        let storage = Arc::new(MockStorage::working());
        let service =
            RetentionService::new(archiving_config(), repository.clone(), storage.clone())
                .unwrap();

        assert_eq!(service.cleanup_old_logs().await.unwrap(), 0);
        assert_eq!(*repository.calls.lock(), vec!["fetch"]);
        assert_eq!(storage.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_archive_empty_batch_rejected() {
        let service = RetentionService::new(
            archiving_config(),
            Arc::new(MockRepository::default()),
            Arc::new(MockStorage::working()),
        )
        .unwrap();

        assert!(matches!(
            service.archive_logs(&[]).await,
            Err(RetentionError::EmptyBatch)
        ));
    }

    #[tokio::test]
    async fn test_uncompressed_archive_name() {
        let config = RetentionConfig {
            archive_compression_enabled: false,
            ..archiving_config()
        };
        let service = RetentionService::new(
            config,
            Arc::new(MockRepository::default()),
            Arc::new(MockStorage::working()),
        )
        .unwrap();

        let name = service.archive_logs(&[old_entry(1, 100)]).await.unwrap();
        assert!(name.ends_with(".json"));
        assert_eq!(service.restore_from_archive(&name).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_restore_errors() {
        let storage = Arc::new(MockStorage::working());
        storage
            .save_archive("logs-archive-20250101.json", b"{broken")
            .await
            .unwrap();
        let service = RetentionService::new(
            archiving_config(),
            Arc::new(MockRepository::default()),
            storage,
        )
        .unwrap();

        assert!(matches!(
            service.restore_from_archive("logs-archive-20240101.json").await,
            Err(RetentionError::NotFound(_))
        ));
        assert!(matches!(
            service.restore_from_archive("logs-archive-20250101.json").await,
            Err(RetentionError::CorruptArchive { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_archives_inclusive_range() {
        let storage = Arc::new(MockStorage::working());
        for name in [
            "logs-archive-20250101.json.gz",
            "logs-archive-20250102-120000.json.gz",
            "logs-archive-20250105.json.gz",
            "logs-archive-garbage.json",
        ] {
            storage.save_archive(name, b"x").await.unwrap();
        }
        let service = RetentionService::new(
            archiving_config(),
            Arc::new(MockRepository::default()),
            storage,
        )
        .unwrap();

        let found = service
            .search_archives(
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            found,
            vec![
                "logs-archive-20250101.json.gz",
                "logs-archive-20250102-120000.json.gz"
            ]
        );
    }

    #[tokio::test]
    async fn test_preview_and_metrics() {
        let repository = Arc::new(MockRepository::with_entries(vec![
            old_entry(1, 120),
            old_entry(2, 100),
            old_entry(3, 95),
            old_entry(4, 3),
        ]));
        let storage = Arc::new(MockStorage::working());
        storage.save_archive("logs-archive-20250101.json", b"[]").await.unwrap();
        let service =
            RetentionService::new(archiving_config(), repository.clone(), storage).unwrap();

        assert_eq!(service.preview_cleanup().await.unwrap(), 3);
        assert_eq!(*repository.calls.lock(), vec!["count"]);

        let metrics = service.get_metrics().await.unwrap();
        assert_eq!(metrics.total_archives, 1);
        assert_eq!(metrics.total_size_bytes, 2);
    }

    #[tokio::test]
    async fn test_retention_job_shape() {
        let repository = Arc::new(MockRepository {
            delete_result: 7,
            ..Default::default()
        });
        let service = Arc::new(
            RetentionService::new(
                RetentionConfig::default(),
                repository.clone(),
                Arc::new(MockStorage::default()),
            )
            .unwrap(),
        );

        let job = service.create_retention_job();
        assert_eq!(job.name, "log-retention");
        assert_eq!(job.interval, Duration::from_secs(86_400));

        let action = job.action.unwrap();
        action(tokio_util::sync::CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(*repository.calls.lock(), vec!["delete"]);
    }
}
