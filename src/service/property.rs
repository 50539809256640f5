//! Property service.
//!
//! One method per resource operation. Each call goes straight to the store;
//! fetch-then-mutate flows hold the per-id lock for their whole duration.

use std::sync::Arc;

use json_patch::Patch;
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::{Property, PropertyFields};
use crate::error::Result;
use crate::service::locks::KeyedLocks;
use crate::service::patch::{apply_patch, parse_patch};
use crate::storage::traits::Storage;

/// Service for property CRUD operations.
pub struct PropertyService {
    /// Storage backend.
    storage: Arc<dyn Storage>,
    /// Serializes writers per property id.
    locks: KeyedLocks,
}

impl PropertyService {
    /// Create a new property service.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            locks: KeyedLocks::new(),
        }
    }

    /// List every property.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn list(&self) -> Result<Vec<Property>> {
        Ok(self.storage.find_all().await?)
    }

    /// Fetch one property.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn find(&self, id: i64) -> Result<Option<Property>> {
        Ok(self.storage.find(id).await?)
    }

    /// Insert a new property.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn create(&self, fields: PropertyFields) -> Result<Property> {
        let property = self.storage.create(fields).await?;
        info!(id = property.id, "Property created");
        Ok(property)
    }

    /// Insert or replace the property at `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn upsert(&self, id: i64, fields: PropertyFields) -> Result<Property> {
        let _guard = self.locks.lock(id).await;

        let property = self.storage.upsert(id, fields).await?;
        info!(id, "Property upserted");
        Ok(property)
    }

    /// Fetch, patch and persist the property at `id`.
    ///
    /// Returns `None` if no property exists; the patch body is not inspected then.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::AppError::PatchFailed`] for a malformed or
    /// failing patch, or a storage error if fetching or saving fails.
    pub async fn patch(&self, id: i64, operations: Value) -> Result<Option<Property>> {
        let _guard = self.locks.lock(id).await;

        let Some(property) = self.storage.find(id).await? else {
            return Ok(None);
        };

        let patch = parse_patch(operations)?;
        let patched = self.patch_updates(property, &patch).await?;

        info!(id, operations = patch.0.len(), "Property patched");
        Ok(Some(patched))
    }

    /// Apply `patch` to `property` and save the result.
    ///
    /// Nothing is persisted unless every operation succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the patch fails or the save fails.
    pub async fn patch_updates(&self, mut property: Property, patch: &Patch) -> Result<Property> {
        property.fields = apply_patch(&property, patch)?;
        Ok(self.storage.save(&property).await?)
    }

    /// Fetch and delete the property at `id`.
    ///
    /// Returns the removed property, or `None` if there was nothing to remove.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn destroy(&self, id: i64) -> Result<Option<Property>> {
        let _guard = self.locks.lock(id).await;

        let property = self.storage.find(id).await?;
        self.remove_entity(property).await
    }

    /// Delete a fetched property; absent input is passed through untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn remove_entity(&self, property: Option<Property>) -> Result<Option<Property>> {
        let Some(property) = property else {
            return Ok(None);
        };

        if !self.storage.destroy(property.id).await? {
            // Removed concurrently by another process; the outcome is the same
            debug!(id = property.id, "Property already gone at delete");
        }

        info!(id = property.id, "Property destroyed");
        Ok(Some(property))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileStorageConfig;
    use crate::error::AppError;
    use crate::storage::file::FileStorage;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_service() -> (PropertyService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(&FileStorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
        })
        .unwrap();
        (PropertyService::new(Arc::new(storage)), temp_dir)
    }

    fn fields(value: Value) -> PropertyFields {
        PropertyFields::from_document(value).unwrap()
    }

    #[tokio::test]
    async fn test_create_then_find() {
        let (service, _temp) = create_test_service();

        let created = service.create(fields(json!({"name": "A"}))).await.unwrap();
        let found = service.find(created.id).await.unwrap();
        assert_eq!(found, Some(created));
    }

    #[tokio::test]
    async fn test_patch_missing_property_returns_none() {
        let (service, _temp) = create_test_service();

        // Even a garbage body yields not-found for a missing id
        let result = service.patch(404, json!("garbage")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_patch_persists_changes() {
        let (service, _temp) = create_test_service();
        let created = service
            .create(fields(json!({"name": "A", "rooms": 4})))
            .await
            .unwrap();

        let patched = service
            .patch(
                created.id,
                json!([{"op": "replace", "path": "/name", "value": "X"}]),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(patched.fields.get("name"), Some(&json!("X")));
        assert_eq!(patched.fields.get("rooms"), Some(&json!(4)));

        let stored = service.find(created.id).await.unwrap().unwrap();
        assert_eq!(stored, patched);
    }

    #[tokio::test]
    async fn test_failed_patch_leaves_state_unchanged() {
        let (service, _temp) = create_test_service();
        let created = service.create(fields(json!({"name": "A"}))).await.unwrap();

        let result = service
            .patch(
                created.id,
                json!([
                    {"op": "replace", "path": "/name", "value": "X"},
                    {"op": "test", "path": "/name", "value": "not-x"}
                ]),
            )
            .await;
        assert!(matches!(result, Err(AppError::PatchFailed(_))));

        let stored = service.find(created.id).await.unwrap().unwrap();
        assert_eq!(stored, created);
    }

    #[tokio::test]
    async fn test_destroy() {
        let (service, _temp) = create_test_service();
        let created = service.create(fields(json!({"name": "A"}))).await.unwrap();

        let removed = service.destroy(created.id).await.unwrap();
        assert_eq!(removed, Some(created.clone()));
        assert!(service.find(created.id).await.unwrap().is_none());
        assert!(service.destroy(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_patches_do_not_lose_updates() {
        let (service, _temp) = create_test_service();
        let service = Arc::new(service);
        let id = service
            .create(fields(json!({"tags": []})))
            .await
            .unwrap()
            .id;

        let mut handles = Vec::new();
        for i in 0..10 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service
                    .patch(id, json!([{"op": "add", "path": "/tags/-", "value": i}]))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stored = service.find(id).await.unwrap().unwrap();
        assert_eq!(stored.fields.get("tags").unwrap().as_array().unwrap().len(), 10);
    }
}
