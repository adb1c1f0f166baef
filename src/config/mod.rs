//! Configuration management for logvault
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. `LOGVAULT__*` environment variables
//! 4. Legacy `LOG_*` retention variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use logvault::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Retention window: {} days", config.retention.retention_days);
//! ```
//!
//! # Environment Variables
//!
//! Any setting can be overridden with `LOGVAULT__<section>__<key>`:
//! - `LOGVAULT__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `LOGVAULT__BROADCAST__CHANNEL_CAPACITY=512`
//!
//! The retention section additionally honours the flat variables
//! `LOG_RETENTION_DAYS`, `LOG_ARCHIVE_ENABLED`, `LOG_ARCHIVE_COMPRESSION`,
//! `LOG_ARCHIVE_STORAGE_TYPE`, `LOG_ARCHIVE_LOCAL_PATH`,
//! `LOG_ARCHIVE_S3_BUCKET` and `LOG_ARCHIVE_S3_REGION`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/logvault.toml`.
//! This can be overridden using the `LOGVAULT_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::{ByteSize, HumanDuration};
pub use models::{
    ArchiveStorageType, BroadcastConfig, Config, RetentionConfig, SchedulerConfig, ServerConfig,
};
pub use sources::apply_legacy_env;
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed, a legacy variable does not
    /// parse, or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, skipping the legacy `LOG_*` layer
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
