//! Redis storage backend.
//!
//! Properties live in one hash (`{prefix}`: id → JSON record). Ids come from
//! an `INCR` counter (`{prefix}:next_id`); allocation claims the slot with
//! `HSETNX`, so ids taken by an upsert are skipped rather than overwritten.

use async_trait::async_trait;
use chrono::Utc;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime};

use crate::config::RedisStorageConfig;
use crate::domain::{Property, PropertyFields};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::{PropertyStore, Storage};

/// Redis-backed property store.
pub struct RedisStorage {
    pool: Pool,
    records_key: String,
    next_id_key: String,
}

impl RedisStorage {
    /// Build the connection pool and verify the server answers.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created or the server is unreachable.
    pub async fn connect(config: &RedisStorageConfig) -> StorageResult<Self> {
        let mut pool_config = Config::from_url(config.url.clone());
        pool_config.pool = Some(PoolConfig::new(config.pool_size));

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let storage = Self {
            pool,
            records_key: config.key_prefix.clone(),
            next_id_key: format!("{}:next_id", config.key_prefix),
        };
        storage.health_check().await?;

        Ok(storage)
    }

    async fn connection(&self) -> StorageResult<Connection> {
        Ok(self.pool.get().await?)
    }

    async fn load(&self, conn: &mut Connection, id: i64) -> StorageResult<Option<Property>> {
        let raw: Option<String> = conn.hget(self.records_key.as_str(), id).await?;
        Ok(raw.map(|json| serde_json::from_str(&json)).transpose()?)
    }
}

#[async_trait]
impl PropertyStore for RedisStorage {
    async fn find_all(&self) -> StorageResult<Vec<Property>> {
        let mut conn = self.connection().await?;
        let raw: Vec<(String, String)> = conn.hgetall(self.records_key.as_str()).await?;

        let mut properties = Vec::with_capacity(raw.len());
        for (field, json) in raw {
            match serde_json::from_str::<Property>(&json) {
                Ok(property) => properties.push(property),
                Err(e) => {
                    tracing::warn!(
                        field = %field,
                        key = %self.records_key,
                        error = %e,
                        "Failed to parse property record"
                    );
                }
            }
        }

        properties.sort_by_key(|p| p.id);
        Ok(properties)
    }

    async fn find(&self, id: i64) -> StorageResult<Option<Property>> {
        let mut conn = self.connection().await?;
        self.load(&mut conn, id).await
    }

    async fn create(&self, fields: PropertyFields) -> StorageResult<Property> {
        let mut conn = self.connection().await?;
        let now = Utc::now();

        loop {
            let id: i64 = conn.incr(self.next_id_key.as_str(), 1).await?;
            let property = Property::new(id, fields.clone(), now);
            let json = serde_json::to_string(&property)?;

            let claimed: bool = conn.hset_nx(self.records_key.as_str(), id, json).await?;
            if claimed {
                return Ok(property);
            }
        }
    }

    async fn upsert(&self, id: i64, fields: PropertyFields) -> StorageResult<Property> {
        let mut conn = self.connection().await?;
        let now = Utc::now();

        let property = match self.load(&mut conn, id).await? {
            Some(mut existing) => {
                existing.replace_fields(fields, now);
                existing
            }
            None => Property::new(id, fields, now),
        };

        let json = serde_json::to_string(&property)?;
        let () = conn.hset(self.records_key.as_str(), id, json).await?;

        Ok(property)
    }

    async fn save(&self, property: &Property) -> StorageResult<Property> {
        let mut conn = self.connection().await?;

        let exists: bool = conn.hexists(self.records_key.as_str(), property.id).await?;
        if !exists {
            return Err(StorageError::Query(format!(
                "property {} was removed before save",
                property.id
            )));
        }

        let mut saved = property.clone();
        saved.touch(Utc::now());

        let json = serde_json::to_string(&saved)?;
        let () = conn.hset(self.records_key.as_str(), saved.id, json).await?;

        Ok(saved)
    }

    async fn destroy(&self, id: i64) -> StorageResult<bool> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn.hdel(self.records_key.as_str(), id).await?;
        Ok(removed > 0)
    }
}

#[async_trait]
impl Storage for RedisStorage {
    async fn health_check(&self) -> StorageResult<()> {
        let mut conn = self.connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;

        if pong == "PONG" {
            Ok(())
        } else {
            Err(StorageError::Unavailable)
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
