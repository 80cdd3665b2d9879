/// SQLite-backed key store
use crate::{
    error::{KeyringError, KeyringResult},
    metrics,
    store::{KeyStore, PublicKeyRecord},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

/// Key store persisting records in the `subjects` table
#[derive(Clone)]
pub struct SqliteKeyStore {
    db: SqlitePool,
}

impl SqliteKeyStore {
    /// Create a store over an already-migrated pool
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

fn store_error(operation: &str, path: &str, e: sqlx::Error) -> KeyringError {
    metrics::record_store_operation(operation, false);
    KeyringError::StoreUnavailable(format!("{} {} failed: {}", operation, path, e))
}

#[async_trait]
impl KeyStore for SqliteKeyStore {
    async fn get(&self, path: &str) -> KeyringResult<Option<PublicKeyRecord>> {
        let result = sqlx::query(
            r#"
            SELECT data
            FROM subjects
            WHERE path = ?1
            "#,
        )
        .bind(path)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| store_error("get", path, e))?;

        metrics::record_store_operation("get", true);

        let Some(row) = result else {
            return Ok(None);
        };

        let data: String = row.try_get("data").map_err(|e| store_error("get", path, e))?;
        let record = serde_json::from_str(&data).map_err(|e| {
            KeyringError::Internal(format!("Corrupt key record at {}: {}", path, e))
        })?;

        Ok(Some(record))
    }

    async fn set(&self, path: &str, record: &PublicKeyRecord) -> KeyringResult<()> {
        let data = serde_json::to_string(record)
            .map_err(|e| KeyringError::Internal(format!("Failed to encode key record: {}", e)))?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO subjects (path, data, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(path) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(path)
        .bind(&data)
        .bind(&now)
        .execute(&self.db)
        .await
        .map_err(|e| store_error("set", path, e))?;

        metrics::record_store_operation("set", true);
        Ok(())
    }

    async fn delete(&self, path: &str) -> KeyringResult<()> {
        sqlx::query("DELETE FROM subjects WHERE path = ?1")
            .bind(path)
            .execute(&self.db)
            .await
            .map_err(|e| store_error("delete", path, e))?;

        metrics::record_store_operation("delete", true);
        Ok(())
    }
}
