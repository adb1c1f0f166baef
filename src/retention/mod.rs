//! Retention policy: prune the live store, archiving to cold storage first
//!
//! [`RetentionService`] owns the policy. It reads expired entries through
//! [`LogRepository`](crate::store::LogRepository), writes them as one archive
//! blob through [`ArchiveStorage`](crate::archive::ArchiveStorage), and only
//! then deletes them. Archives can later be searched by date and restored.

pub mod codec;
pub mod error;
pub mod service;

pub use error::{Result, RetentionError};
pub use service::{RETENTION_JOB_INTERVAL, RETENTION_JOB_NAME, RetentionService};
