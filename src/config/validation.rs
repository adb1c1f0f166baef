use super::models::{ArchiveStorageType, BroadcastConfig, Config, RetentionConfig};
use std::time::Duration;
use thiserror::Error;

/// Upper bound on the retention window, roughly a century
pub const MAX_RETENTION_DAYS: i64 = 36_500;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Retention days must be between 1 and {MAX_RETENTION_DAYS}, got {0}")]
    InvalidRetentionDays(i64),

    #[error("Archival is enabled but no {storage_type} archive target is configured")]
    MissingArchiveTarget { storage_type: ArchiveStorageType },

    #[error("Archive batch limit must be positive")]
    InvalidBatchLimit,

    #[error("Broadcast channel capacity must be positive")]
    InvalidChannelCapacity,

    #[error("max_ingest_bytes must be positive")]
    InvalidIngestLimit,

    #[error("Scheduler duration must be positive: {field}")]
    InvalidSchedulerDuration { field: &'static str },

    #[error("Broadcast duration must be positive: {field}")]
    InvalidBroadcastDuration { field: &'static str },

    #[error("Heartbeat interval must be shorter than the idle timeout")]
    HeartbeatNotBelowIdleTimeout,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_retention(&config.retention)?;

    if config.server.max_ingest_bytes.as_u64() == 0 {
        return Err(ValidationError::InvalidIngestLimit);
    }
    validate_broadcast(&config.broadcast)?;

    for (field, value) in [
        ("shutdown_timeout", config.scheduler.shutdown_timeout.as_duration()),
        ("health_interval", config.scheduler.health_interval.as_duration()),
    ] {
        if value == Duration::ZERO {
            return Err(ValidationError::InvalidSchedulerDuration { field });
        }
    }

    Ok(())
}

fn validate_broadcast(broadcast: &BroadcastConfig) -> Result<(), ValidationError> {
    if broadcast.channel_capacity == 0 {
        return Err(ValidationError::InvalidChannelCapacity);
    }

    let heartbeat = broadcast.heartbeat_interval.as_duration();
    let idle = broadcast.idle_timeout.as_duration();
    for (field, value) in [("heartbeat_interval", heartbeat), ("idle_timeout", idle)] {
        if value == Duration::ZERO {
            return Err(ValidationError::InvalidBroadcastDuration { field });
        }
    }
    if heartbeat >= idle {
        return Err(ValidationError::HeartbeatNotBelowIdleTimeout);
    }

    Ok(())
}

/// Retention policy checks, also run by the retention service on construction
pub fn validate_retention(retention: &RetentionConfig) -> Result<(), ValidationError> {
    if !(1..=MAX_RETENTION_DAYS).contains(&retention.retention_days) {
        return Err(ValidationError::InvalidRetentionDays(retention.retention_days));
    }
    if retention.batch_limit == 0 {
        return Err(ValidationError::InvalidBatchLimit);
    }

    if retention.archive_enabled {
        let has_target = match retention.storage_type {
            ArchiveStorageType::Local => !retention.local_archive_path.as_os_str().is_empty(),
            ArchiveStorageType::Remote => retention
                .remote_bucket
                .as_deref()
                .is_some_and(|bucket| !bucket.trim().is_empty()),
        };
        if !has_target {
            return Err(ValidationError::MissingArchiveTarget {
                storage_type: retention.storage_type,
            });
        }
    }

    Ok(())
}
