//! Process-wide counters for the lifecycle manager

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    entries_ingested: AtomicU64,
    cleanup_runs: AtomicU64,
    cleanup_failures: AtomicU64,
    entries_deleted: AtomicU64,
    archives_written: AtomicU64,
    broadcasts_delivered: AtomicU64,
    broadcasts_dropped: AtomicU64,
    jobs_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_ingested(&self) {
        self.entries_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cleanup_succeeded(&self, deleted: u64) {
        self.cleanup_runs.fetch_add(1, Ordering::Relaxed);
        self.entries_deleted.fetch_add(deleted, Ordering::Relaxed);
        tracing::debug!(counter = "entries_deleted", deleted, "Metric incremented");
    }

    pub fn cleanup_failed(&self) {
        self.cleanup_runs.fetch_add(1, Ordering::Relaxed);
        self.cleanup_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "cleanup_failures", "Metric incremented");
    }

    pub fn archive_written(&self) {
        self.archives_written.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "archives_written", "Metric incremented");
    }

    pub fn broadcast(&self, delivered: u64, dropped: u64) {
        self.broadcasts_delivered.fetch_add(delivered, Ordering::Relaxed);
        self.broadcasts_dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    pub fn job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_failed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            entries_ingested: self.entries_ingested.load(Ordering::Relaxed),
            cleanup_runs: self.cleanup_runs.load(Ordering::Relaxed),
            cleanup_failures: self.cleanup_failures.load(Ordering::Relaxed),
            entries_deleted: self.entries_deleted.load(Ordering::Relaxed),
            archives_written: self.archives_written.load(Ordering::Relaxed),
            broadcasts_delivered: self.broadcasts_delivered.load(Ordering::Relaxed),
            broadcasts_dropped: self.broadcasts_dropped.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub entries_ingested: u64,
    pub cleanup_runs: u64,
    pub cleanup_failures: u64,
    pub entries_deleted: u64,
    pub archives_written: u64,
    pub broadcasts_delivered: u64,
    pub broadcasts_dropped: u64,
    pub jobs_failed: u64,
}
