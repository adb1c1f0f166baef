use crate::humanize::{ByteSize, HumanDuration};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use super::validation::{self, ValidationError};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Embedded log store location
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    /// Upper bound for one `POST /logs` body after decompression
    #[serde(default = "default_max_ingest_bytes")]
    pub max_ingest_bytes: ByteSize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            data_path: default_data_path(),
            max_ingest_bytes: default_max_ingest_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data/logs")
}

fn default_max_ingest_bytes() -> ByteSize {
    ByteSize(1024 * 1024) // 1 MB
}

/// Where archives are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveStorageType {
    #[default]
    Local,
    #[serde(alias = "s3")]
    Remote,
}

impl FromStr for ArchiveStorageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" | "s3" => Ok(Self::Remote),
            other => Err(format!("unknown storage type '{}'", other)),
        }
    }
}

impl fmt::Display for ArchiveStorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// Retention and archival policy, immutable once the process has started
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default)]
    pub archive_enabled: bool,
    #[serde(default = "default_true")]
    pub archive_compression_enabled: bool,
    #[serde(default)]
    pub storage_type: ArchiveStorageType,
    #[serde(default = "default_local_archive_path")]
    pub local_archive_path: PathBuf,
    pub remote_bucket: Option<String>,
    pub remote_region: Option<String>,
    /// Key prefix inside the remote bucket
    #[serde(default)]
    pub remote_prefix: String,
    /// Maximum entries archived per cleanup run
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            archive_enabled: false,
            archive_compression_enabled: true,
            storage_type: ArchiveStorageType::Local,
            local_archive_path: default_local_archive_path(),
            remote_bucket: None,
            remote_region: None,
            remote_prefix: String::new(),
            batch_limit: default_batch_limit(),
        }
    }
}

impl RetentionConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_retention(self)
    }
}

fn default_retention_days() -> i64 {
    90
}

fn default_true() -> bool {
    true
}

fn default_local_archive_path() -> PathBuf {
    PathBuf::from("./logs-archive")
}

fn default_batch_limit() -> usize {
    10_000
}

/// Live fan-out settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BroadcastConfig {
    /// Per-connection outbound buffer; a full buffer drops the connection
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// How often live viewers are pinged
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: HumanDuration,
    /// Viewers silent for this long (no pong or other frame) are disconnected
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: HumanDuration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            heartbeat_interval: default_heartbeat_interval(),
            idle_timeout: default_idle_timeout(),
        }
    }
}

fn default_channel_capacity() -> usize {
    256
}

fn default_heartbeat_interval() -> HumanDuration {
    HumanDuration::from_secs(30)
}

fn default_idle_timeout() -> HumanDuration {
    HumanDuration::from_secs(60)
}

/// Background job settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// How long `stop` waits for running jobs
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: HumanDuration,
    /// Interval of the `store-health` job
    #[serde(default = "default_health_interval")]
    pub health_interval: HumanDuration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: default_shutdown_timeout(),
            health_interval: default_health_interval(),
        }
    }
}

fn default_shutdown_timeout() -> HumanDuration {
    HumanDuration::from_secs(30)
}

fn default_health_interval() -> HumanDuration {
    HumanDuration::from_secs(5 * 60)
}
