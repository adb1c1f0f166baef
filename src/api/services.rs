use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::NaiveDate;
use tracing::debug;

use super::{
    error::ApiError,
    models::{
        ArchiveListResponse, ArchiveMetricsResponse, ArchiveQuery, HealthResponse, IngestResponse,
    },
    state::AppState,
    utils::{read_body, require_json},
};
use crate::broadcast::LogPublisher;
use crate::models::{LogEntry, NewLogEntry};

/// Log ingestion endpoint (POST /logs)
///
/// Stores the entry, then fans it out to every live viewer whose filter
/// accepts it. Delivery problems never fail the request.
pub async fn ingest_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    require_json(&headers)?;

    // Decompression already handled by RequestDecompressionLayer
    let limit = state.config.server.max_ingest_bytes.as_u64() as usize;
    let bytes = read_body(body, limit).await?;

    let entry: NewLogEntry = serde_json::from_slice(&bytes)?;
    validate_entry(&entry)?;

    let stored = state.store.append(entry)?;
    state.metrics.entry_ingested();

    let report = state.connections.publish(&stored).await;
    debug!(id = stored.id, delivered = report.delivered, "Ingested log entry");

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            id: stored.id,
            timestamp: stored.timestamp,
            delivered: report.delivered,
        }),
    ))
}

fn validate_entry(entry: &NewLogEntry) -> Result<(), ApiError> {
    for (field, value) in [
        ("service", &entry.service),
        ("level", &entry.level),
        ("message", &entry.message),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::InvalidPayload(format!("{field} is required")));
        }
    }
    Ok(())
}

/// Archive listing (GET /archives?start=YYYY-MM-DD&end=YYYY-MM-DD)
///
/// Without bounds every archive is listed; with either bound only archives
/// whose name encodes a date inside the inclusive range are returned.
pub async fn list_archives(
    State(state): State<AppState>,
    Query(query): Query<ArchiveQuery>,
) -> Result<Json<ArchiveListResponse>, ApiError> {
    let archives = match (query.start, query.end) {
        (None, None) => state.retention.list_archives().await?,
        (start, end) => {
            let start = start.unwrap_or(NaiveDate::MIN);
            let end = end.unwrap_or(NaiveDate::MAX);
            if start > end {
                return Err(ApiError::InvalidPayload(format!(
                    "start {start} is after end {end}"
                )));
            }
            state.retention.search_archives(start, end).await?
        }
    };

    Ok(Json(ArchiveListResponse { archives }))
}

pub async fn archive_metrics(
    State(state): State<AppState>,
) -> Result<Json<ArchiveMetricsResponse>, ApiError> {
    let metrics = state.retention.get_metrics().await?;
    Ok(Json(metrics.into()))
}

/// Archive contents (GET /archives/{filename})
pub async fn restore_archive(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    let entries = state.retention.restore_from_archive(&filename).await?;
    Ok(Json(entries))
}

pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state.store.health_check()?;
    let stats = state.store.stats()?;

    Ok(Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections: state.connections.connection_count().await,
        stored_entries: stats.approximate_entries,
        metrics: state.metrics.snapshot(),
    }))
}
