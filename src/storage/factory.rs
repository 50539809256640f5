//! Storage backend factory.
//!
//! Creates the appropriate storage backend based on configuration.

use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::AppError;
use crate::storage::file::FileStorage;
use crate::storage::redis::RedisStorage;
use crate::storage::sql::{MySqlStorage, PostgresStorage};
use crate::storage::traits::Storage;

/// Create a storage backend based on configuration.
///
/// # Arguments
///
/// * `config` - Storage configuration
///
/// # Returns
///
/// An `Arc<dyn Storage>` pointing to the configured storage backend.
///
/// # Errors
///
/// Returns an error if the storage backend cannot be initialized.
pub async fn create_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>, AppError> {
    let storage: Arc<dyn Storage> = match config.backend {
        StorageBackend::File => Arc::new(FileStorage::new(&config.file)?),
        StorageBackend::Redis => Arc::new(RedisStorage::connect(&config.redis).await?),
        StorageBackend::MySQL => Arc::new(MySqlStorage::connect(&config.mysql).await?),
        StorageBackend::PostgreSQL => {
            Arc::new(PostgresStorage::connect(&config.postgresql).await?)
        }
    };

    // Verify storage is healthy
    storage.health_check().await?;

    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileStorageConfig, SqlPoolConfig};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_file_storage() {
        let temp_dir = TempDir::new().unwrap();

        let config = StorageConfig {
            backend: StorageBackend::File,
            file: FileStorageConfig {
                data_dir: temp_dir.path().to_path_buf(),
            },
            ..Default::default()
        };

        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_name(), "file");
    }

    #[tokio::test]
    async fn test_unreachable_postgres_fails() {
        let mut config = StorageConfig {
            backend: StorageBackend::PostgreSQL,
            ..Default::default()
        };
        config.postgresql.pool = SqlPoolConfig {
            url: "postgres://nobody@127.0.0.1:1/none".to_string(),
            min_connections: 0,
            connect_timeout: 1,
            ..Default::default()
        };

        let result = create_storage(&config).await;
        assert!(matches!(result, Err(AppError::Storage(_))));
    }
}
