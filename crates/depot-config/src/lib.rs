use anyhow::{Context, Result};
use depot_core::LogLayer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Service configuration for depot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound applied to the `limit` of list requests.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one file per stored blob.
    #[serde(default = "default_storage_folder")]
    pub folder: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Per-layer overrides, e.g. `database = "debug"`.
    #[serde(default)]
    pub layers: BTreeMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_page_size: default_max_page_size(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            folder: default_storage_folder(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            layers: BTreeMap::new(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_max_page_size() -> u64 {
    1000
}

fn default_max_upload_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_storage_folder() -> PathBuf {
    PathBuf::from("./file-storage")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./depot.db")
}

fn default_max_connections() -> u32 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load config from default location or create default if not found
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            Self::from_file(&path)
        } else {
            // Create default config file
            let config = Config::default();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let content = toml::to_string_pretty(&config)?;
            std::fs::write(&path, content)?;
            Ok(config)
        }
    }

    /// Load config from an explicit TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Get config file path
    pub fn config_path() -> PathBuf {
        if let Some(dirs) = directories::ProjectDirs::from("com", "depot", "depot") {
            dirs.config_dir().join("config.toml")
        } else {
            PathBuf::from("~/.depot/config.toml")
        }
    }

    /// Apply `DEPOT_*` environment variable overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup.
    ///
    /// Keys:
    /// - `DEPOT_HTTP_HOST`, `DEPOT_HTTP_PORT`
    /// - `DEPOT_STORAGE_FOLDER`
    /// - `DEPOT_DB_PATH`
    /// - `DEPOT_LOG_LEVEL`, `DEPOT_<LAYER>_LOG_LEVEL`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("DEPOT_HTTP_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("DEPOT_HTTP_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("invalid DEPOT_HTTP_PORT: {}", port))?;
        }
        if let Some(folder) = lookup("DEPOT_STORAGE_FOLDER") {
            self.storage.folder = PathBuf::from(folder);
        }
        if let Some(path) = lookup("DEPOT_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(level) = lookup("DEPOT_LOG_LEVEL") {
            self.logging.level = level;
        }
        for layer in LogLayer::ALL {
            let key = format!("DEPOT_{}_LOG_LEVEL", layer.name().to_ascii_uppercase());
            if let Some(level) = lookup(&key) {
                self.logging.layers.insert(layer.name().to_string(), level);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.max_page_size, 1000);
        assert_eq!(config.storage.folder, PathBuf::from("./file-storage"));
        assert_eq!(config.database.max_connections, 1);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.layers.is_empty());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.storage.folder, config.storage.folder);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [logging.layers]
            database = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.server.port, 9000);
        assert_eq!(parsed.server.host, "127.0.0.1");
        assert_eq!(parsed.database.path, PathBuf::from("./depot.db"));
        assert_eq!(parsed.logging.layers["database"], "debug");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depot.toml");
        std::fs::write(&path, "[storage]\nfolder = \"/srv/blobs\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.storage.folder, PathBuf::from("/srv/blobs"));

        std::fs::write(&path, "[storage\n").unwrap();
        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DEPOT_HTTP_PORT", "9100"),
            ("DEPOT_STORAGE_FOLDER", "/data/files"),
            ("DEPOT_DB_PATH", "/data/meta.db"),
            ("DEPOT_TRANSPORT_LOG_LEVEL", "warn"),
        ]);
        let mut config = Config::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.storage.folder, PathBuf::from("/data/files"));
        assert_eq!(config.database.path, PathBuf::from("/data/meta.db"));
        assert_eq!(config.logging.layers["transport"], "warn");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_bad_port_override() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| {
            (key == "DEPOT_HTTP_PORT").then(|| "not-a-port".to_string())
        });
        assert!(result.is_err());
    }
}
