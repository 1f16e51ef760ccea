use std::process::ExitCode;
use std::sync::Arc;

use area_index::{AreaIndex, AreaIndexWatcher};
use world_server::{
    init_defaults, CoreError, CoreResult, FileStorage, Server, ServerConfig, ServerState,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Read `.env` before the logger so RUST_LOG may come from it.
    let config = ServerConfig::from_env();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = match config {
        Ok(config) => run(config).await,
        Err(error) => Err(error),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("world server failed: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServerConfig) -> CoreResult<()> {
    let storage = Arc::new(FileStorage::new(config.data_dir.clone()));
    let report = init_defaults(storage.as_ref()).await?;

    let index = Arc::new(AreaIndex::new(config.index_paths()));
    let building = index.clone();
    tokio::task::spawn_blocking(move || building.build())
        .await
        .map_err(|error| CoreError::Internal(format!("area index build task failed: {error}")))??;

    // A stale cache predates the home area written above.
    if let Some(home) = report.created_home {
        if index.get(&home.id).is_none() {
            let indexing = index.clone();
            tokio::task::spawn_blocking(move || indexing.add_entry(home))
                .await
                .map_err(|error| CoreError::Internal(format!("home area index task failed: {error}")))??;
        }
    }
    tracing::info!("area index ready with {} areas", index.len());

    let watcher = match AreaIndexWatcher::spawn(index.clone(), config.index_debounce) {
        Ok(watcher) => Some(watcher),
        Err(error) => {
            tracing::warn!("area watcher unavailable, index will not follow disk edits: {error}");
            None
        }
    };

    let state = Arc::new(ServerState::new(storage, index));
    let mut server = Server::start(state, &config).await?;
    tracing::info!(
        "world server running: api {}, thingdefs {}, areabundles {}",
        server.api_addr(),
        server.thingdefs_addr(),
        server.areabundles_addr()
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|error| CoreError::Internal(format!("failed to listen for ctrl-c: {error}")))?;
    tracing::info!("shutting down");
    server.shutdown().map_err(CoreError::Internal)?;
    drop(watcher);
    Ok(())
}
