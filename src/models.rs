//! Log entry shapes shared by the store, retention and broadcast layers.
//!
//! ```json
//! {
//!   "id": 42,
//!   "service": "review",
//!   "level": "ERROR",
//!   "message": "upstream timed out",
//!   "timestamp": "2025-01-01T10:00:00Z",
//!   "tags": ["github", "sync"],
//!   "context": { "request_id": "abc" }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A persisted log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub service: String,
    pub level: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl LogEntry {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Ingest payload; the store assigns `id` and defaults `timestamp` to now
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewLogEntry {
    pub service: String,
    pub level: String,
    pub message: String,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl NewLogEntry {
    pub fn new(
        service: impl Into<String>,
        level: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            level: level.into(),
            message: message.into(),
            timestamp: None,
            tags: Vec::new(),
            context: Map::new(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn into_entry(self, id: u64) -> LogEntry {
        LogEntry {
            id,
            service: self.service,
            level: self.level,
            message: self.message,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            tags: self.tags,
            context: self.context,
        }
    }
}
