//! Storage trait definitions.
//!
//! These traits define the interface for storage backends, enabling swapping
//! between different implementations without changing business logic.

use async_trait::async_trait;

use crate::domain::{Property, PropertyFields};
use crate::error::StorageResult;

/// Property persistence operations.
///
/// Every call round-trips to the backing store; implementations keep no
/// read cache. Timestamps are managed here, not by callers.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// List every property, ordered by ascending id.
    async fn find_all(&self) -> StorageResult<Vec<Property>>;

    /// Fetch one property by id.
    async fn find(&self, id: i64) -> StorageResult<Option<Property>>;

    /// Insert a new property under a freshly allocated id.
    async fn create(&self, fields: PropertyFields) -> StorageResult<Property>;

    /// Insert a property at `id`, or replace the attributes of the existing one.
    ///
    /// Replacing keeps the original `created_at`. Ids introduced this way are
    /// never handed out by [`PropertyStore::create`] afterwards.
    async fn upsert(&self, id: i64, fields: PropertyFields) -> StorageResult<Property>;

    /// Persist an already-fetched property, refreshing `updated_at`.
    async fn save(&self, property: &Property) -> StorageResult<Property>;

    /// Delete a property.
    ///
    /// Returns `false` if nothing was stored under `id`.
    async fn destroy(&self, id: i64) -> StorageResult<bool>;
}

/// Combined storage trait.
///
/// Adds backend health reporting on top of [`PropertyStore`].
#[async_trait]
pub trait Storage: PropertyStore {
    /// Check if the storage backend is healthy and reachable.
    async fn health_check(&self) -> StorageResult<()>;

    /// Get the storage backend name.
    fn backend_name(&self) -> &'static str;
}
