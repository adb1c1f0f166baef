//! Live connection registry and fan-out

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::filter::ConnectionFilter;
use super::{FanoutReport, LogPublisher};
use crate::models::LogEntry;
use crate::observability::Metrics;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Connection already registered: {0}")]
    DuplicateConnection(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Why a sink refused an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("connection closed")]
    Closed,

    #[error("connection buffer full")]
    Full,
}

/// Non-blocking outbound side of one live connection
pub trait ConnectionSink: Send + Sync {
    fn try_deliver(&self, entry: &LogEntry) -> std::result::Result<(), DeliveryError>;
}

/// Bounded channel sink drained by the connection's writer task
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<LogEntry>,
}

impl ChannelSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LogEntry>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl ConnectionSink for ChannelSink {
    fn try_deliver(&self, entry: &LogEntry) -> std::result::Result<(), DeliveryError> {
        self.tx.try_send(entry.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// A registered viewer
#[derive(Clone)]
pub struct Connection {
    pub sink: Arc<dyn ConnectionSink>,
    pub filter: ConnectionFilter,
    pub connected_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(sink: Arc<dyn ConnectionSink>, filter: ConnectionFilter) -> Self {
        Self {
            sink,
            filter,
            connected_at: Utc::now(),
        }
    }
}

/// Opaque id for a new connection
pub fn new_connection_id() -> String {
    Uuid::new_v4().to_string()
}

/// Shared map of live connections
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<HashMap<String, Connection>>>,
    metrics: Option<Arc<Metrics>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(metrics: Arc<Metrics>) -> Self {
        Self {
            inner: Arc::default(),
            metrics: Some(metrics),
        }
    }

    pub async fn register(&self, id: impl Into<String>, connection: Connection) -> Result<()> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(RegistryError::InvalidInput(
                "connection id is required".to_string(),
            ));
        }

        let mut connections = self.inner.lock().await;
        if connections.contains_key(&id) {
            return Err(RegistryError::DuplicateConnection(id));
        }

        info!(connection_id = %id, filter = ?connection.filter, "Connection registered");
        connections.insert(id, connection);
        Ok(())
    }

    /// Remove a connection; unknown ids are not an error
    pub async fn unregister(&self, id: &str) -> bool {
        let Some(connection) = self.inner.lock().await.remove(id) else {
            return false;
        };
        let connected_secs = (Utc::now() - connection.connected_at).num_seconds();
        info!(connection_id = %id, connected_secs, "Connection unregistered");
        true
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[async_trait]
impl LogPublisher for ConnectionRegistry {
    async fn publish(&self, entry: &LogEntry) -> FanoutReport {
        let mut report = FanoutReport::default();
        let mut connections = self.inner.lock().await;

        connections.retain(|id, connection| {
            if !connection.filter.matches(entry) {
                report.filtered += 1;
                return true;
            }

            match connection.sink.try_deliver(entry) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(reason) => {
                    warn!(
                        connection_id = %id,
                        %reason,
                        "Dropping connection after failed delivery"
                    );
                    report.dropped += 1;
                    false
                }
            }
        });
        drop(connections);

        if let Some(metrics) = &self.metrics {
            metrics.broadcast(report.delivered as u64, report.dropped as u64);
        }
        debug!(
            entry_id = entry.id,
            delivered = report.delivered,
            filtered = report.filtered,
            dropped = report.dropped,
            "Broadcast log entry"
        );
        report
    }
}
