pub mod config;
pub mod reconcile;
pub mod serve;

use anyhow::{Context, Result};
use depot_config::Config;
use depot_storage::SqliteStore;
use std::path::Path;

/// Config file (explicit or default), then `DEPOT_*` environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    config.apply_env()?;
    Ok(config)
}

/// Open the metadata store named by config.
pub async fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::new(&config.database.path, config.database.max_connections)
        .await
        .with_context(|| {
            format!(
                "failed to open metadata store at {}",
                config.database.path.display()
            )
        })
}
