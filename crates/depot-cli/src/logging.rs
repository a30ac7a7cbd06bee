//! Subscriber setup and runtime log level changes.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::Result;
use depot_config::LoggingConfig;
use depot_core::{Error, LevelControl, LogLayer, LogLevels, parse_level};
use tracing_subscriber::{EnvFilter, Registry, prelude::*, reload};

/// Levels read from config: the default first, then per-layer overrides.
pub fn levels_from_config(config: &LoggingConfig) -> Result<LogLevels> {
    let mut levels = LogLevels::new(parse_level(&config.level)?);
    for (layer, level) in &config.layers {
        let layer: LogLayer = layer.parse()?;
        levels.set(layer, parse_level(level)?);
    }
    Ok(levels)
}

/// Install the global subscriber. `RUST_LOG`, when set, wins over config
/// until the first runtime change.
pub fn init(config: &LoggingConfig) -> Result<ReloadLevels> {
    let levels = levels_from_config(config)?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(levels.directives()))?;

    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(ReloadLevels::new(levels, handle))
}

/// Owns the live filter and the levels it was built from.
pub struct ReloadLevels {
    levels: Mutex<LogLevels>,
    handle: reload::Handle<EnvFilter, Registry>,
}

impl ReloadLevels {
    pub fn new(levels: LogLevels, handle: reload::Handle<EnvFilter, Registry>) -> Self {
        Self {
            levels: Mutex::new(levels),
            handle,
        }
    }
}

impl LevelControl for ReloadLevels {
    fn set_level(&self, layer: &str, level: &str) -> depot_core::Result<()> {
        let layer: LogLayer = layer.parse()?;
        let level = parse_level(level)?;

        let mut levels = self
            .levels
            .lock()
            .map_err(|_| Error::internal("log level state is poisoned"))?;
        let mut next = levels.clone();
        next.set(layer, level);

        let filter = EnvFilter::try_new(next.directives())
            .map_err(|e| Error::internal(format!("invalid log filter: {}", e)))?;
        self.handle
            .reload(filter)
            .map_err(|e| Error::internal(format!("failed to reload log filter: {}", e)))?;

        *levels = next;
        Ok(())
    }

    fn levels(&self) -> BTreeMap<String, String> {
        self.levels
            .lock()
            .map(|levels| levels.snapshot())
            .unwrap_or_default()
    }
}
