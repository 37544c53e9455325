use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use catalog_sync::config::{config_path, load_config};
use catalog_sync::{init_logging, CatalogSyncError, InMemoryRepository, Result, SyncService};

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(config_path);

    match run(path).await {
        Ok(count) => {
            log::info!("Stopped with {} component(s) in the catalog", count);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Loads the config, runs the service until Ctrl-C and returns the number of
/// stored components.
async fn run(path: PathBuf) -> Result<usize> {
    let config = load_config(&path)?;

    if config.sources.is_empty() {
        log::warn!("No sources configured in {}", path.display());
    }
    for (index, source) in config.sources.iter().enumerate() {
        log::info!("Source {}: {}", index, source.describe());
    }

    let repo = Arc::new(InMemoryRepository::new());
    let service = SyncService::new(config, repo.clone());
    let handles = service.start()?;

    let signal = tokio::signal::ctrl_c().await.map_err(CatalogSyncError::Signal);

    service.stop();
    for handle in handles {
        if let Err(e) = handle.await {
            log::warn!("Sync loop ended abnormally: {}", e);
        }
    }

    signal?;
    Ok(repo.len())
}
