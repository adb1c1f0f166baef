use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::models::{LogEntry, NewLogEntry};

use super::LogRepository;
use super::error::{Result, StoreError};
use super::keys::{encode_cutoff, encode_entry_key, encode_meta_key, entry_prefix};

const META_NEXT_ID: &str = "next_id";

/// Fjall-backed log store: entries ordered by timestamp, plus an id counter
#[derive(Clone)]
pub struct FjallLogStore {
    keyspace: Keyspace,
    entries: PartitionHandle,
    metadata: PartitionHandle,
    /// Held across id allocation and commit so the persisted counter only grows
    next_id: Arc<Mutex<u64>>,
}

impl FjallLogStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening log store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let entries = keyspace.open_partition("entries", PartitionCreateOptions::default())?;
        let metadata = keyspace.open_partition("metadata", PartitionCreateOptions::default())?;

        let next_id = match metadata.get(encode_meta_key(META_NEXT_ID))? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    StoreError::InvalidKey(format!("{} is not a u64", META_NEXT_ID))
                })?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };

        info!(next_id, "Log store opened");
        Ok(Self {
            keyspace,
            entries,
            metadata,
            next_id: Arc::new(Mutex::new(next_id)),
        })
    }

    /// Persist a new entry, assigning the next sequential id
    pub fn append(&self, entry: NewLogEntry) -> Result<LogEntry> {
        let mut next_id = self.next_id.lock();
        let id = *next_id;
        let entry = entry.into_entry(id);

        let value = serde_json::to_vec(&entry)?;
        let mut batch = self.keyspace.batch();
        batch.insert(&self.entries, encode_entry_key(&entry.timestamp, id), value);
        batch.insert(
            &self.metadata,
            encode_meta_key(META_NEXT_ID),
            (id + 1).to_be_bytes().to_vec(),
        );
        batch.commit()?;
        *next_id = id + 1;
        drop(next_id);

        debug!(id, service = %entry.service, "Appended log entry");
        Ok(entry)
    }

    /// Flush all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Verify the metadata partition is readable
    pub fn health_check(&self) -> Result<()> {
        let _ = self.metadata.get(encode_meta_key(META_NEXT_ID))?;
        Ok(())
    }

    /// Cheap counters; the entry count comes from partition metadata
    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            approximate_entries: self.entries.approximate_len(),
            next_id: *self.next_id.lock(),
        })
    }
}

/// Key range covering every entry strictly older than `cutoff`
fn older_than(cutoff: &DateTime<Utc>) -> Range<Vec<u8>> {
    entry_prefix().to_vec()..encode_cutoff(cutoff)
}

#[async_trait]
impl LogRepository for FjallLogStore {
    async fn delete_entries_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut batch = self.keyspace.batch();
        let mut deleted = 0u64;

        for item in self.entries.range(older_than(&cutoff)) {
            let (key, _) = item?;
            batch.remove(&self.entries, key);
            deleted += 1;
        }

        if deleted > 0 {
            batch.commit()?;
            self.persist()?;
        }

        info!(deleted, %cutoff, "Deleted expired log entries");
        Ok(deleted)
    }

    async fn get_entries_for_archival(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LogEntry>> {
        let mut results = Vec::new();

        for item in self.entries.range(older_than(&cutoff)).take(limit) {
            let (_, value) = item?;
            results.push(serde_json::from_slice(&value)?);
        }

        debug!(count = results.len(), limit, %cutoff, "Fetched entries for archival");
        Ok(results)
    }

    async fn count_entries_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut count = 0;
        for item in self.entries.range(older_than(&cutoff)) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    async fn delete_entries(&self, entries: &[LogEntry]) -> Result<u64> {
        let mut batch = self.keyspace.batch();
        let mut deleted = 0u64;

        for entry in entries {
            let key = encode_entry_key(&entry.timestamp, entry.id);
            if self.entries.contains_key(&key)? {
                batch.remove(&self.entries, key);
                deleted += 1;
            }
        }

        if deleted > 0 {
            batch.commit()?;
            self.persist()?;
        }

        debug!(requested = entries.len(), deleted, "Deleted archived log entries");
        Ok(deleted)
    }
}

#[derive(Debug, Clone)]
pub struct StoreStats {
    /// May lag behind recent deletes until compaction
    pub approximate_entries: usize,
    pub next_id: u64,
}
