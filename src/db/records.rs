//! Key-value queue record CRUD.

use crate::error::StoreError;
use crate::{Error, Result};

use super::Database;

impl Database {
    /// Insert or replace a record
    pub async fn put_record(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO queue_records (key, value, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Store(StoreError::QueryFailed(format!(
                "Failed to put record '{}': {}",
                key, e
            )))
        })?;

        Ok(())
    }

    /// Delete a record by key (no-op if absent)
    pub async fn delete_record(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM queue_records WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Store(StoreError::QueryFailed(format!(
                    "Failed to delete record '{}': {}",
                    key, e
                )))
            })?;

        Ok(())
    }

    /// All record values, in insertion order
    pub async fn all_records(&self) -> Result<Vec<String>> {
        let values: Vec<String> =
            sqlx::query_scalar("SELECT value FROM queue_records ORDER BY created_at, key")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    Error::Store(StoreError::QueryFailed(format!(
                        "Failed to list records: {}",
                        e
                    )))
                })?;

        Ok(values)
    }

    /// Delete every record
    pub async fn clear_records(&self) -> Result<()> {
        sqlx::query("DELETE FROM queue_records")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Store(StoreError::QueryFailed(format!(
                    "Failed to clear records: {}",
                    e
                )))
            })?;

        Ok(())
    }
}
