//! Real-time fan-out of newly ingested log entries
//!
//! The ingest path hands every stored entry to a [`LogPublisher`]. The
//! [`ConnectionRegistry`] implementation delivers it to each live viewer whose
//! [`ConnectionFilter`] accepts it. Delivery is best-effort: a viewer that
//! cannot keep up, or has gone away, is dropped without affecting the rest.

pub mod filter;
pub mod registry;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::LogEntry;

pub use filter::ConnectionFilter;
pub use registry::{
    ChannelSink, Connection, ConnectionRegistry, ConnectionSink, DeliveryError, RegistryError,
    new_connection_id,
};

/// Outcome of one publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    pub delivered: usize,
    pub filtered: usize,
    pub dropped: usize,
}

/// Sink for newly ingested entries; never fails the publisher
#[async_trait]
pub trait LogPublisher: Send + Sync {
    async fn publish(&self, entry: &LogEntry) -> FanoutReport;
}
