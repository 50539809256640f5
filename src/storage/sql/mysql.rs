//! `MySQL` storage backend.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use sqlx::Row;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::types::Json;

use super::now_micros;
use crate::config::MySqlStorageConfig;
use crate::domain::{Property, PropertyFields};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::{PropertyStore, Storage};

const CREATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS properties (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    attributes JSON NOT NULL,
    created_at DATETIME(6) NOT NULL,
    updated_at DATETIME(6) NOT NULL
)
";

// An explicit id of 0 must be stored as 0, not replaced by AUTO_INCREMENT
const SET_SQL_MODE: &str = "SET SESSION sql_mode = \
     CONCAT_WS(',', NULLIF(@@SESSION.sql_mode, ''), 'NO_AUTO_VALUE_ON_ZERO')";

const SELECT_ALL: &str =
    "SELECT id, attributes, created_at, updated_at FROM properties ORDER BY id";

const SELECT_ONE: &str =
    "SELECT id, attributes, created_at, updated_at FROM properties WHERE id = ?";

/// `MySQL`-backed property store.
///
/// Timestamps are kept in `DATETIME(6)` columns as naive UTC.
pub struct MySqlStorage {
    pool: MySqlPool,
}

impl MySqlStorage {
    /// Connect, then make sure the `properties` table exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot connect or the schema cannot be created.
    pub async fn connect(config: &MySqlStorageConfig) -> StorageResult<Self> {
        let pool = MySqlPoolOptions::new()
            .min_connections(config.pool.min_connections)
            .max_connections(config.pool.max_connections)
            .acquire_timeout(Duration::from_secs(config.pool.connect_timeout))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query(SET_SQL_MODE).execute(&mut *conn).await?;
                    Ok(())
                })
            })
            .connect(&config.pool.url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let storage = Self::from_pool(pool);
        storage.ensure_schema().await?;
        Ok(storage)
    }

    /// Wrap an existing pool. The schema is not touched.
    ///
    /// Connections must already run with `NO_AUTO_VALUE_ON_ZERO` for an
    /// upsert at id 0 to work; [`MySqlStorage::connect`] sets it.
    #[must_use]
    pub const fn from_pool(pool: MySqlPool) -> Self {
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

fn property_from_row(row: &MySqlRow) -> Result<Property, sqlx::Error> {
    let Json(attributes): Json<Map<String, Value>> = row.try_get("attributes")?;
    let created_at: NaiveDateTime = row.try_get("created_at")?;
    let updated_at: NaiveDateTime = row.try_get("updated_at")?;

    Ok(Property {
        id: row.try_get("id")?,
        fields: PropertyFields::from_body(attributes),
        created_at: created_at.and_utc(),
        updated_at: updated_at.and_utc(),
    })
}

#[async_trait]
impl PropertyStore for MySqlStorage {
    async fn find_all(&self) -> StorageResult<Vec<Property>> {
        let rows = sqlx::query(SELECT_ALL).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| property_from_row(row).map_err(StorageError::from))
            .collect()
    }

    async fn find(&self, id: i64) -> StorageResult<Option<Property>> {
        let row = sqlx::query(SELECT_ONE)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(property_from_row).transpose()?)
    }

    async fn create(&self, fields: PropertyFields) -> StorageResult<Property> {
        let now = now_micros();

        let result = sqlx::query(
            "INSERT INTO properties (attributes, created_at, updated_at) VALUES (?, ?, ?)",
        )
        .bind(Json(fields.as_map()))
        .bind(now.naive_utc())
        .bind(now.naive_utc())
        .execute(&self.pool)
        .await?;

        let id = i64::try_from(result.last_insert_id())
            .map_err(|e| StorageError::Query(format!("generated id out of range: {e}")))?;

        Ok(Property::new(id, fields, now))
    }

    async fn upsert(&self, id: i64, fields: PropertyFields) -> StorageResult<Property> {
        let now = now_micros();
        let mut tx = self.pool.begin().await?;

        // AUTO_INCREMENT moves past explicit ids on its own
        sqlx::query(
            "INSERT INTO properties (id, attributes, created_at, updated_at) \
             VALUES (?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE \
                 attributes = VALUES(attributes), \
                 updated_at = VALUES(updated_at)",
        )
        .bind(id)
        .bind(Json(fields.as_map()))
        .bind(now.naive_utc())
        .bind(now.naive_utc())
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(SELECT_ONE)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(property_from_row(&row)?)
    }

    async fn save(&self, property: &Property) -> StorageResult<Property> {
        let mut saved = property.clone();
        saved.touch(now_micros());

        let result = sqlx::query(
            "UPDATE properties SET attributes = ?, updated_at = ? WHERE id = ?",
        )
        .bind(Json(saved.fields.as_map()))
        .bind(saved.updated_at.naive_utc())
        .bind(saved.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Query(format!(
                "property {} was removed before save",
                property.id
            )));
        }

        Ok(saved)
    }

    async fn destroy(&self, id: i64) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM properties WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Storage for MySqlStorage {
    async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "mysql"
    }
}
