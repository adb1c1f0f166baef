use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use super::FjallLogStore;
use crate::AnyError;
use crate::observability::Metrics;
use crate::scheduler::{Job, job_fn};

pub const HEALTH_JOB_NAME: &str = "store-health";

/// Periodic store check that also reports the process counters
pub fn create_health_job(store: FjallLogStore, metrics: Arc<Metrics>, interval: Duration) -> Job {
    Job::builder()
        .name(HEALTH_JOB_NAME)
        .interval(interval)
        .action(job_fn(move |_token| {
            let store = store.clone();
            let metrics = metrics.clone();
            async move {
                if let Err(e) = store.health_check() {
                    error!(error = %e, "Log store health check failed");
                    return Err::<(), AnyError>(e.into());
                }

                let stats = store.stats()?;
                let snapshot = metrics.snapshot();
                info!(
                    entries = stats.approximate_entries,
                    next_id = stats.next_id,
                    ingested = snapshot.entries_ingested,
                    cleanup_runs = snapshot.cleanup_runs,
                    cleanup_failures = snapshot.cleanup_failures,
                    archives_written = snapshot.archives_written,
                    broadcasts_dropped = snapshot.broadcasts_dropped,
                    "Log store healthy"
                );
                Ok(())
            }
        }))
        .build()
}
