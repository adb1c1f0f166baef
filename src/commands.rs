//! One-shot CLI commands that operate on the store and archives directly

use std::sync::Arc;

use logvault::AnyError;
use logvault::archive;
use logvault::config::Config;
use logvault::retention::RetentionService;
use logvault::store::FjallLogStore;
use serde::Serialize;
use tracing::info;

use crate::cli::{ArchiveCommands, CleanupArgs};

fn open_retention(config: &Config) -> Result<(FjallLogStore, RetentionService), AnyError> {
    let store = FjallLogStore::open(&config.server.data_path)?;
    let storage = archive::from_config(&config.retention)?;
    let service =
        RetentionService::new(config.retention.clone(), Arc::new(store.clone()), storage)?;
    Ok((store, service))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AnyError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn cleanup(args: CleanupArgs) -> Result<(), AnyError> {
    let config = Config::load()?;
    let (store, service) = open_retention(&config)?;

    if args.dry_run {
        let eligible = service.preview_cleanup().await?;
        info!(eligible, "Dry run, nothing deleted");
        return print_json(&serde_json::json!({ "eligible": eligible }));
    }

    let deleted = service.cleanup_old_logs().await?;
    store.persist()?;
    print_json(&serde_json::json!({ "deleted": deleted }))
}

pub async fn archives(command: ArchiveCommands) -> Result<(), AnyError> {
    let config = Config::load()?;
    let (_store, service) = open_retention(&config)?;

    match command {
        ArchiveCommands::List => print_json(&service.list_archives().await?),
        ArchiveCommands::Search { start, end } => {
            if start > end {
                return Err(format!("start {start} is after end {end}").into());
            }
            print_json(&service.search_archives(start, end).await?)
        }
        ArchiveCommands::Restore { filename } => {
            print_json(&service.restore_from_archive(&filename).await?)
        }
        ArchiveCommands::Metrics => {
            let metrics = service.get_metrics().await?;
            info!(total_size = %metrics.total_size(), "Archive storage usage");
            print_json(&metrics)
        }
    }
}
