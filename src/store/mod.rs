//! Log persistence for the lifecycle manager
//!
//! The retention layer only sees the [`LogRepository`] trait: operations
//! over a time boundary, plus removal of exactly the rows it archived.
//! [`FjallLogStore`] is the embedded implementation used by the server and
//! CLI; tests substitute mocks.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use logvault::store::{FjallLogStore, LogRepository};
//!
//! let store = FjallLogStore::open("data/logs")?;
//! store.append(NewLogEntry::new("review", "INFO", "started"))?;
//! let stale = store.count_entries_older_than(cutoff).await?;
//! ```
pub mod engine;
pub mod error;
pub mod health;
pub mod keys;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::LogEntry;

pub use engine::{FjallLogStore, StoreStats};
pub use error::{Result, StoreError};
pub use health::{HEALTH_JOB_NAME, create_health_job};

/// Time-boundary access to the live log store
#[async_trait]
pub trait LogRepository: Send + Sync {
    /// Delete every entry with `timestamp < cutoff`, returning how many were removed
    async fn delete_entries_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Up to `limit` entries with `timestamp < cutoff`, oldest first
    async fn get_entries_for_archival(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LogEntry>>;

    async fn count_entries_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Delete exactly these entries, returning how many were still present
    async fn delete_entries(&self, entries: &[LogEntry]) -> Result<u64>;
}
