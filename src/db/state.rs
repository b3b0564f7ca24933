//! Runtime key/value state: auto-open extensions.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::Database;

const AUTO_OPEN_KEY: &str = "auto_open_extensions";

impl Database {
    /// Read a runtime state value
    pub async fn get_state(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM runtime_state WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to read runtime state {}: {}",
                        key, e
                    )))
                })?;

        Ok(value)
    }

    /// Write a runtime state value, replacing any previous one
    pub async fn set_state(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO runtime_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to write runtime state {}: {}",
                key, e
            )))
        })?;

        Ok(())
    }

    /// Extensions registered for automatic opening, `None` if never saved
    pub async fn get_auto_open_extensions(&self) -> Result<Option<Vec<String>>> {
        match self.get_state(AUTO_OPEN_KEY).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Persist the extensions registered for automatic opening
    pub async fn set_auto_open_extensions(&self, extensions: &[String]) -> Result<()> {
        let json = serde_json::to_string(extensions)?;
        self.set_state(AUTO_OPEN_KEY, &json).await
    }
}
