//! `PostgreSQL` storage backend.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;

use super::now_micros;
use crate::config::PostgresStorageConfig;
use crate::domain::{Property, PropertyFields};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::{PropertyStore, Storage};

const CREATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS properties (
    id BIGSERIAL PRIMARY KEY,
    attributes JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
)
";

const COLUMNS: &str = "id, attributes, created_at, updated_at";

/// `PostgreSQL`-backed property store.
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connect, then make sure the `properties` table exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot connect or the schema cannot be created.
    pub async fn connect(config: &PostgresStorageConfig) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(config.pool.min_connections)
            .max_connections(config.pool.max_connections)
            .acquire_timeout(Duration::from_secs(config.pool.connect_timeout))
            .connect(&config.pool.url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let storage = Self::from_pool(pool);
        storage.ensure_schema().await?;
        Ok(storage)
    }

    /// Wrap an existing pool. The schema is not touched.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `properties` table if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL statement fails.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }
}

fn property_from_row(row: &PgRow) -> Result<Property, sqlx::Error> {
    let Json(attributes): Json<Map<String, Value>> = row.try_get("attributes")?;

    Ok(Property {
        id: row.try_get("id")?,
        fields: PropertyFields::from_body(attributes),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl PropertyStore for PostgresStorage {
    async fn find_all(&self) -> StorageResult<Vec<Property>> {
        let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM properties ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| property_from_row(row).map_err(StorageError::from))
            .collect()
    }

    async fn find(&self, id: i64) -> StorageResult<Option<Property>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM properties WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(property_from_row).transpose()?)
    }

    async fn create(&self, fields: PropertyFields) -> StorageResult<Property> {
        let row = sqlx::query(&format!(
            "INSERT INTO properties (attributes, created_at, updated_at) \
             VALUES ($1, $2, $2) RETURNING {COLUMNS}"
        ))
        .bind(Json(fields.as_map()))
        .bind(now_micros())
        .fetch_one(&self.pool)
        .await?;

        Ok(property_from_row(&row)?)
    }

    async fn upsert(&self, id: i64, fields: PropertyFields) -> StorageResult<Property> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "INSERT INTO properties (id, attributes, created_at, updated_at) \
             VALUES ($1, $2, $3, $3) \
             ON CONFLICT (id) DO UPDATE SET \
                 attributes = EXCLUDED.attributes, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(Json(fields.as_map()))
        .bind(now_micros())
        .fetch_one(&mut *tx)
        .await?;

        // Explicit ids bypass the identity sequence; move it past them
        sqlx::query(
            "SELECT setval(s.seq, $1) \
             FROM (SELECT pg_get_serial_sequence('properties', 'id')::regclass AS seq) s \
             WHERE $1 >= COALESCE(pg_sequence_last_value(s.seq), 1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(property_from_row(&row)?)
    }

    async fn save(&self, property: &Property) -> StorageResult<Property> {
        let row = sqlx::query(&format!(
            "UPDATE properties SET attributes = $2, updated_at = $3 \
             WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(property.id)
        .bind(Json(property.fields.as_map()))
        .bind(now_micros())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(property_from_row(&row)?),
            None => Err(StorageError::Query(format!(
                "property {} was removed before save",
                property.id
            ))),
        }
    }

    async fn destroy(&self, id: i64) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM properties WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgresql"
    }
}
