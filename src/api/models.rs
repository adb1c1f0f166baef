//! Request and response bodies for the HTTP surface

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::archive::StorageMetrics;
use crate::observability::MetricsSnapshot;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: usize,
    pub stored_entries: usize,
    pub metrics: MetricsSnapshot,
}

/// `GET /archives` filter; both bounds are inclusive calendar dates
#[derive(Debug, Default, Deserialize)]
pub struct ArchiveQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct ArchiveListResponse {
    pub archives: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ArchiveMetricsResponse {
    #[serde(flatten)]
    pub metrics: StorageMetrics,
    pub total_size: String,
}

impl From<StorageMetrics> for ArchiveMetricsResponse {
    fn from(metrics: StorageMetrics) -> Self {
        Self {
            total_size: metrics.total_size().to_string(),
            metrics,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub delivered: usize,
}
