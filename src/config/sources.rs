use super::ConfigError;
use super::models::{ArchiveStorageType, Config};
use config::{Environment, File};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const CONFIG_ENV_VAR: &str = "LOGVAULT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/logvault.toml";
const ENV_PREFIX: &str = "LOGVAULT";
const ENV_SEPARATOR: &str = "__";

pub const LOG_RETENTION_DAYS: &str = "LOG_RETENTION_DAYS";
pub const LOG_ARCHIVE_ENABLED: &str = "LOG_ARCHIVE_ENABLED";
pub const LOG_ARCHIVE_COMPRESSION: &str = "LOG_ARCHIVE_COMPRESSION";
pub const LOG_ARCHIVE_STORAGE_TYPE: &str = "LOG_ARCHIVE_STORAGE_TYPE";
pub const LOG_ARCHIVE_LOCAL_PATH: &str = "LOG_ARCHIVE_LOCAL_PATH";
pub const LOG_ARCHIVE_S3_BUCKET: &str = "LOG_ARCHIVE_S3_BUCKET";
pub const LOG_ARCHIVE_S3_REGION: &str = "LOG_ARCHIVE_S3_REGION";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. `LOGVAULT__*` environment variables
/// 5. Legacy `LOG_*` retention variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    apply_legacy_env(&mut config, |key| env::var(key).ok())?;

    Ok(config)
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // LOGVAULT__RETENTION__RETENTION_DAYS -> retention.retention_days
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    Ok(config.try_deserialize()?)
}

/// Overlay the flat `LOG_*` variables onto the retention section
///
/// `lookup` abstracts the environment so tests need not mutate process state.
/// Unset or empty variables leave the current value alone.
pub fn apply_legacy_env<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    let retention = &mut config.retention;

    if let Some(raw) = get(LOG_RETENTION_DAYS) {
        retention.retention_days = parse_value::<i64>(LOG_RETENTION_DAYS, &raw)?;
    }
    if let Some(raw) = get(LOG_ARCHIVE_ENABLED) {
        retention.archive_enabled = parse_flag(&raw);
    }
    if let Some(raw) = get(LOG_ARCHIVE_COMPRESSION) {
        retention.archive_compression_enabled = parse_flag(&raw);
    }
    if let Some(raw) = get(LOG_ARCHIVE_STORAGE_TYPE) {
        retention.storage_type = parse_value::<ArchiveStorageType>(LOG_ARCHIVE_STORAGE_TYPE, &raw)?;
    }
    if let Some(raw) = get(LOG_ARCHIVE_LOCAL_PATH) {
        retention.local_archive_path = PathBuf::from(raw);
    }
    if let Some(raw) = get(LOG_ARCHIVE_S3_BUCKET) {
        retention.remote_bucket = Some(raw);
    }
    if let Some(raw) = get(LOG_ARCHIVE_S3_REGION) {
        retention.remote_region = Some(raw);
    }

    Ok(())
}

/// Only `true` and `1` enable a flag
fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim(), "true" | "1")
}

fn parse_value<T: FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: raw.to_string(),
    })
}
