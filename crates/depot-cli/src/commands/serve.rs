use anyhow::{Context, Result};
use depot_config::Config;
use depot_core::LevelControl;
use depot_engine::Coordinator;
use depot_server::{DepotServer, shutdown_signal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::open_store;

pub async fn handle(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
    storage_folder: Option<PathBuf>,
    levels: Arc<dyn LevelControl>,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(folder) = storage_folder {
        config.storage.folder = folder;
    }

    tokio::fs::create_dir_all(&config.storage.folder)
        .await
        .with_context(|| {
            format!(
                "failed to create storage folder {}",
                config.storage.folder.display()
            )
        })?;

    let store = open_store(&config).await?;
    info!(
        database = %config.database.path.display(),
        storage = %config.storage.folder.display(),
        "Storage ready"
    );

    let server = Arc::new(DepotServer {
        coordinator: Coordinator::new(Arc::new(store.clone())),
        storage_folder: config.storage.folder.clone(),
        levels,
        max_page_size: config.server.max_page_size,
        max_upload_bytes: config.server.max_upload_bytes,
    });

    let result = server
        .serve(&config.server.host, config.server.port, shutdown_signal())
        .await;
    store.close().await;
    result
}
