//! File-based storage backend.
//!
//! This backend stores each property as a JSON file. Writes go through a
//! temporary file and an atomic rename, ids come from a `flock`-protected
//! sequence file. Suitable for development and single-node deployments.
//!
//! Directory structure:
//! ```text
//! data/
//! ├── sequence.json
//! └── properties/
//!     └── {id}.json
//! ```

mod sequence;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::config::FileStorageConfig;
use crate::domain::{Property, PropertyFields};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::{PropertyStore, Storage};

pub use sequence::FileIdSequence;

/// File-based storage implementation.
pub struct FileStorage {
    /// Base data directory.
    base_dir: PathBuf,
    /// Directory holding one file per property.
    properties_dir: PathBuf,
    /// Id allocator.
    sequence: FileIdSequence,
    /// Serializes writers within this process.
    lock: Mutex<()>,
}

impl FileStorage {
    /// Create a new file storage instance.
    ///
    /// # Arguments
    ///
    /// * `config` - File storage configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the data directories cannot be created.
    pub fn new(config: &FileStorageConfig) -> StorageResult<Self> {
        let base_dir = config.data_dir.clone();
        let properties_dir = base_dir.join("properties");

        for dir in [&base_dir, &properties_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                StorageError::FileIO(format!("Failed to create directory {}: {e}", dir.display()))
            })?;
        }

        Ok(Self {
            sequence: FileIdSequence::new(base_dir.join("sequence.json")),
            properties_dir,
            base_dir,
            lock: Mutex::new(()),
        })
    }

    fn property_path(&self, id: i64) -> PathBuf {
        self.properties_dir.join(format!("{id}.json"))
    }

    fn load(&self, id: i64) -> StorageResult<Option<Property>> {
        read_property(&self.property_path(id))
    }

    /// Write a property through a temp file so readers never see a partial record.
    fn write(&self, property: &Property) -> StorageResult<()> {
        let path = self.property_path(property.id);
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_vec_pretty(property)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;

        Ok(())
    }
}

/// Read one property file; a missing file is `None`.
fn read_property(path: &Path) -> StorageResult<Option<Property>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl PropertyStore for FileStorage {
    async fn find_all(&self) -> StorageResult<Vec<Property>> {
        let mut properties = Vec::new();

        for entry in std::fs::read_dir(&self.properties_dir)? {
            let path = entry?.path();

            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match read_property(&path) {
                Ok(Some(property)) => properties.push(property),
                // Removed between listing and reading
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = ?path, error = %e, "Failed to parse property file");
                }
            }
        }

        properties.sort_by_key(|p| p.id);
        Ok(properties)
    }

    async fn find(&self, id: i64) -> StorageResult<Option<Property>> {
        self.load(id)
    }

    async fn create(&self, fields: PropertyFields) -> StorageResult<Property> {
        let _guard = self.lock.lock().await;

        // Another process may have upserted the allocated id already
        let id = loop {
            let id = self.sequence.allocate()?;
            if !self.property_path(id).exists() {
                break id;
            }
        };

        let property = Property::new(id, fields, Utc::now());
        self.write(&property)?;

        Ok(property)
    }

    async fn upsert(&self, id: i64, fields: PropertyFields) -> StorageResult<Property> {
        let _guard = self.lock.lock().await;
        let now = Utc::now();

        let property = match self.load(id)? {
            Some(mut existing) => {
                existing.replace_fields(fields, now);
                existing
            }
            None => Property::new(id, fields, now),
        };

        self.write(&property)?;
        self.sequence.observe(id)?;

        Ok(property)
    }

    async fn save(&self, property: &Property) -> StorageResult<Property> {
        let _guard = self.lock.lock().await;

        if !self.property_path(property.id).exists() {
            return Err(StorageError::Query(format!(
                "property {} was removed before save",
                property.id
            )));
        }

        let mut saved = property.clone();
        saved.touch(Utc::now());
        self.write(&saved)?;

        Ok(saved)
    }

    async fn destroy(&self, id: i64) -> StorageResult<bool> {
        let _guard = self.lock.lock().await;

        match std::fs::remove_file(self.property_path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn health_check(&self) -> StorageResult<()> {
        if !self.base_dir.exists() {
            return Err(StorageError::Unavailable);
        }

        let test_file = self.base_dir.join(".health_check");
        tokio::fs::write(&test_file, b"ok")
            .await
            .map_err(|e| StorageError::FileIO(format!("Health check failed: {e}")))?;
        tokio::fs::remove_file(&test_file)
            .await
            .map_err(|e| StorageError::FileIO(format!("Health check cleanup failed: {e}")))?;

        self.sequence.peek()?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_storage() -> (FileStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = FileStorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
        };
        let storage = FileStorage::new(&config).unwrap();
        (storage, temp_dir)
    }

    fn fields(value: serde_json::Value) -> PropertyFields {
        PropertyFields::from_document(value).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (storage, _temp) = create_test_storage();
        assert!(storage.health_check().await.is_ok());
        assert_eq!(storage.backend_name(), "file");
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (storage, _temp) = create_test_storage();

        let first = storage.create(fields(json!({"name": "A"}))).await.unwrap();
        let second = storage.create(fields(json!({"name": "B"}))).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        let loaded = storage.find(1).await.unwrap().unwrap();
        assert_eq!(loaded, first);
        assert!(storage.find(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_all_is_ordered() {
        let (storage, _temp) = create_test_storage();

        for name in ["a", "b", "c"] {
            storage.create(fields(json!({ "name": name }))).await.unwrap();
        }
        storage.upsert(10, fields(json!({"name": "j"}))).await.unwrap();

        let ids: Vec<i64> = storage
            .find_all()
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 10]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_reserves_id() {
        let (storage, _temp) = create_test_storage();

        let inserted = storage
            .upsert(5, fields(json!({"name": "A", "city": "Oslo"})))
            .await
            .unwrap();
        assert_eq!(inserted.id, 5);

        let replaced = storage.upsert(5, fields(json!({"name": "B"}))).await.unwrap();
        assert_eq!(replaced.created_at, inserted.created_at);
        assert!(replaced.fields.get("city").is_none());

        let created = storage.create(fields(json!({}))).await.unwrap();
        assert_eq!(created.id, 6);
    }

    #[tokio::test]
    async fn test_save_and_destroy() {
        let (storage, _temp) = create_test_storage();

        let mut property = storage.create(fields(json!({"name": "A"}))).await.unwrap();
        property.fields = fields(json!({"name": "X"}));
        let saved = storage.save(&property).await.unwrap();
        assert_eq!(saved.fields.get("name"), Some(&json!("X")));
        assert!(saved.updated_at >= property.updated_at);

        assert!(storage.destroy(property.id).await.unwrap());
        assert!(!storage.destroy(property.id).await.unwrap());
        assert!(storage.find(property.id).await.unwrap().is_none());

        // Saving a removed record is an error, not a resurrection
        assert!(storage.save(&property).await.is_err());
    }

    #[tokio::test]
    async fn test_find_all_skips_corrupt_files() {
        let (storage, temp) = create_test_storage();

        storage.create(fields(json!({"name": "ok"}))).await.unwrap();
        std::fs::write(temp.path().join("properties/77.json"), b"{not json").unwrap();

        let all = storage.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_create_after_upsert_at_max_id_fails_cleanly() {
        let (storage, _temp) = create_test_storage();

        storage.upsert(i64::MAX, fields(json!({"name": "last"}))).await.unwrap();

        let result = storage.create(fields(json!({"name": "next"}))).await;
        assert!(matches!(result, Err(StorageError::Query(_))));

        // The record at the top of the range is still intact
        let last = storage.find(i64::MAX).await.unwrap().unwrap();
        assert_eq!(last.fields.get("name"), Some(&json!("last")));
        assert_eq!(storage.find_all().await.unwrap().len(), 1);
    }
}
