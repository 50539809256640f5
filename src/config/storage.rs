//! Storage configuration.

use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;

/// Storage backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// File-based storage (development/single-node).
    #[default]
    File,
    /// Redis storage.
    Redis,
    /// `MySQL` storage.
    #[serde(rename = "mysql")]
    MySQL,
    /// `PostgreSQL` storage.
    #[serde(rename = "postgresql")]
    PostgreSQL,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Redis => write!(f, "redis"),
            Self::MySQL => write!(f, "mysql"),
            Self::PostgreSQL => write!(f, "postgresql"),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Storage backend type.
    #[serde(default)]
    pub backend: StorageBackend,

    /// File storage configuration.
    #[serde(default)]
    pub file: FileStorageConfig,

    /// Redis storage configuration.
    #[serde(default)]
    pub redis: RedisStorageConfig,

    /// `MySQL` storage configuration.
    #[serde(default)]
    pub mysql: MySqlStorageConfig,

    /// `PostgreSQL` storage configuration.
    #[serde(default)]
    pub postgresql: PostgresStorageConfig,
}

impl StorageConfig {
    /// Validate the storage configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration fields are missing for the selected backend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.backend {
            StorageBackend::File => Ok(()),
            StorageBackend::Redis => {
                if self.redis.url.is_empty() {
                    return Err(ConfigError::Message(
                        "storage.redis.url cannot be empty".to_string(),
                    ));
                }
                Ok(())
            }
            StorageBackend::MySQL => self.mysql.pool.validate("storage.mysql"),
            StorageBackend::PostgreSQL => self.postgresql.pool.validate("storage.postgresql"),
        }
    }
}

/// File storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FileStorageConfig {
    /// Directory for storing data files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Redis storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisStorageConfig {
    /// Redis URL.
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Key prefix for all property keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

const fn default_pool_size() -> usize {
    10
}

fn default_key_prefix() -> String {
    "properties".to_string()
}

impl Default for RedisStorageConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_pool_size(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// Connection pool settings shared by the SQL backends.
#[derive(Debug, Clone, Deserialize)]
pub struct SqlPoolConfig {
    /// Connection URL.
    #[serde(default)]
    pub url: String,

    /// Connection pool minimum size.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection pool maximum size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

const fn default_min_connections() -> u32 {
    1
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_connect_timeout() -> u64 {
    5
}

impl SqlPoolConfig {
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::Message(format!("{section}.url cannot be empty")));
        }
        if self.min_connections > self.max_connections {
            return Err(ConfigError::Message(format!(
                "{section}.min_connections cannot exceed max_connections"
            )));
        }
        Ok(())
    }
}

impl Default for SqlPoolConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// `MySQL` storage configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MySqlStorageConfig {
    /// Pool settings.
    #[serde(flatten)]
    pub pool: SqlPoolConfig,
}

/// `PostgreSQL` storage configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostgresStorageConfig {
    /// Pool settings.
    #[serde(flatten)]
    pub pool: SqlPoolConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_display() {
        assert_eq!(StorageBackend::File.to_string(), "file");
        assert_eq!(StorageBackend::Redis.to_string(), "redis");
        assert_eq!(StorageBackend::MySQL.to_string(), "mysql");
        assert_eq!(StorageBackend::PostgreSQL.to_string(), "postgresql");
    }

    #[test]
    fn test_storage_config_validation() {
        let config = StorageConfig::default();
        assert!(config.validate().is_ok());

        let mut config = StorageConfig::default();
        config.backend = StorageBackend::PostgreSQL;
        assert!(config.validate().is_err());

        config.postgresql.pool.url = "postgres://localhost/properties".to_string();
        assert!(config.validate().is_ok());

        config.postgresql.pool.min_connections = 50;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redis_requires_url() {
        let mut config = StorageConfig {
            backend: StorageBackend::Redis,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.redis.url.clear();
        assert!(config.validate().is_err());
    }
}
