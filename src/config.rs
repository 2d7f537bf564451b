use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Exact origin allowed for CORS. Unset means any origin.
    #[serde(default)]
    pub allowed_origin: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

/// Which blob backend the service writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    Gcs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    #[serde(default)]
    pub local: LocalStorageConfig,
    #[serde(default)]
    pub gcs: GcsStorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalStorageConfig {
    #[serde(default = "default_local_path")]
    pub base_path: String,
}

/// Bucket credentials are HMAC interoperability keys, not a service account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GcsStorageConfig {
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub access_id: String,
    #[serde(default)]
    pub secret: String,
    /// Endpoint override, mainly for tests against a fake server
    #[serde(default)]
    pub endpoint: Option<String>,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5003
}

fn default_db_path() -> String {
    "data/filedrop.db".to_string()
}

fn default_backend() -> StorageBackend {
    StorageBackend::Local
}

fn default_local_path() -> String {
    "uploads".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origin: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            local: LocalStorageConfig::default(),
            gcs: GcsStorageConfig::default(),
        }
    }
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_local_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.ensure_directories()?;
        Ok(config)
    }

    /// Load configuration from conf.toml or config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["conf.toml", "config.toml", "data/conf.toml", "data/config.toml"];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config: Config = toml::from_str(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Apply environment variable overrides
    /// Format: FD_CONF_<SECTION>_<KEY>
    fn apply_env_overrides(&mut self) {
        // Server overrides. Plain PORT is honored as an alias used by
        // common hosting environments.
        if let Ok(val) = env::var("FD_CONF_SERVER_HOST") {
            self.server.host = val;
        }
        for key in ["FD_CONF_SERVER_PORT", "PORT"] {
            if let Ok(val) = env::var(key) {
                if let Ok(port) = val.parse() {
                    self.server.port = port;
                    break;
                }
            }
        }
        if let Ok(val) = env::var("FD_CONF_SERVER_ALLOWED_ORIGIN") {
            if !val.trim().is_empty() {
                self.server.allowed_origin = Some(val);
            }
        }

        // Database overrides
        if let Ok(val) = env::var("FD_CONF_DATABASE_PATH") {
            self.database.path = val;
        }

        // Storage overrides
        if let Ok(val) = env::var("FD_CONF_STORAGE_BACKEND") {
            match val.to_lowercase().as_str() {
                "local" => self.storage.backend = StorageBackend::Local,
                "gcs" => self.storage.backend = StorageBackend::Gcs,
                other => tracing::warn!("Unknown storage backend '{}', keeping configured one", other),
            }
        }
        if let Ok(val) = env::var("FD_CONF_STORAGE_LOCAL_BASE_PATH") {
            self.storage.local.base_path = val;
        }
        if let Ok(val) = env::var("FD_CONF_STORAGE_GCS_BUCKET") {
            self.storage.gcs.bucket = val;
        }
        if let Ok(val) = env::var("FD_CONF_STORAGE_GCS_ACCESS_ID") {
            self.storage.gcs.access_id = val;
        }
        if let Ok(val) = env::var("FD_CONF_STORAGE_GCS_SECRET") {
            self.storage.gcs.secret = val;
        }
        if let Ok(val) = env::var("FD_CONF_STORAGE_GCS_ENDPOINT") {
            if !val.trim().is_empty() {
                self.storage.gcs.endpoint = Some(val);
            }
        }
    }

    /// Ensure required directories exist
    fn ensure_directories(&self) -> anyhow::Result<()> {
        // Ensure database directory exists
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }

        // Ensure local storage directory exists
        if self.storage.backend == StorageBackend::Local {
            fs::create_dir_all(&self.storage.local.base_path)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5003);
        assert!(config.server.allowed_origin.is_none());
        assert_eq!(config.database.path, "data/filedrop.db");
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.local.base_path, "uploads");
    }

    #[test]
    fn parses_backend_selection() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            backend = "gcs"

            [storage.gcs]
            bucket = "drop-bucket"
            access_id = "GOOG1EXAMPLE"
            secret = "shh"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Gcs);
        assert_eq!(config.storage.gcs.bucket, "drop-bucket");
        // Untouched sections fall back to defaults
        assert_eq!(config.server.port, 5003);
    }
}
