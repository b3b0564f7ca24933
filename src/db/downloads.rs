//! Download history CRUD operations.

use chrono::{DateTime, Utc};
use std::path::Path;

use crate::error::DatabaseError;
use crate::types::{DbHandle, DownloadRecord, DownloadState};
use crate::{Error, Result};

use super::{Database, DownloadRow};

impl Database {
    /// Insert a new download record and return its handle
    pub async fn insert_download(&self, record: &DownloadRecord) -> Result<DbHandle> {
        let result = sqlx::query(
            r#"
            INSERT INTO downloads (
                full_path, url, start_time, received_bytes, total_bytes, state
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.full_path.to_string_lossy().as_ref())
        .bind(&record.url)
        .bind(record.start_time.timestamp_micros())
        .bind(record.received_bytes as i64)
        .bind(record.total_bytes as i64)
        .bind(record.state.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert download: {}",
                e
            )))
        })?;

        Ok(DbHandle(result.last_insert_rowid()))
    }

    /// Get a download by handle
    pub async fn get_download(&self, handle: DbHandle) -> Result<Option<DownloadRecord>> {
        let row = sqlx::query_as::<_, DownloadRow>(
            r#"
            SELECT id, full_path, url, start_time, received_bytes, total_bytes, state
            FROM downloads
            WHERE id = ?
            "#,
        )
        .bind(handle)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get download: {}",
                e
            )))
        })?;

        Ok(row.map(DownloadRecord::from))
    }

    /// List all downloads, newest first
    pub async fn list_downloads(&self) -> Result<Vec<DownloadRecord>> {
        let rows = sqlx::query_as::<_, DownloadRow>(
            r#"
            SELECT id, full_path, url, start_time, received_bytes, total_bytes, state
            FROM downloads
            ORDER BY start_time DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list downloads: {}",
                e
            )))
        })?;

        Ok(rows.into_iter().map(DownloadRecord::from).collect())
    }

    /// Update received bytes and state
    pub async fn update_download_progress(
        &self,
        handle: DbHandle,
        received_bytes: u64,
        state: DownloadState,
    ) -> Result<()> {
        sqlx::query("UPDATE downloads SET received_bytes = ?, state = ? WHERE id = ?")
            .bind(received_bytes as i64)
            .bind(state.to_i32())
            .bind(handle)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to update download: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Update the on-disk path
    pub async fn set_download_path(&self, handle: DbHandle, path: &Path) -> Result<()> {
        sqlx::query("UPDATE downloads SET full_path = ? WHERE id = ?")
            .bind(path.to_string_lossy().as_ref())
            .bind(handle)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to update download path: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Delete a download record
    pub async fn delete_download(&self, handle: DbHandle) -> Result<()> {
        sqlx::query("DELETE FROM downloads WHERE id = ?")
            .bind(handle)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete download: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Delete finished (complete or cancelled) records started in `[begin, end)`
    ///
    /// `end = None` removes everything from `begin` on. Returns the number of
    /// rows deleted.
    pub async fn delete_downloads_between(
        &self,
        begin: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        let end = end.map(|t| t.timestamp_micros()).unwrap_or(i64::MAX);
        let result = sqlx::query(
            r#"
            DELETE FROM downloads
            WHERE start_time >= ? AND start_time < ? AND (state = ? OR state = ?)
            "#,
        )
        .bind(begin.timestamp_micros())
        .bind(end)
        .bind(DownloadState::Complete.to_i32())
        .bind(DownloadState::Cancelled.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to delete downloads in range: {}",
                e
            )))
        })?;

        Ok(result.rows_affected())
    }

    /// Handles of records whose URL or path contains `text` (case-insensitive)
    pub async fn search_downloads(&self, text: &str) -> Result<Vec<DbHandle>> {
        let pattern = format!("%{}%", escape_like(text));
        let handles = sqlx::query_scalar::<_, DbHandle>(
            r#"
            SELECT id FROM downloads
            WHERE url LIKE ?1 ESCAPE '\' OR full_path LIKE ?1 ESCAPE '\'
            ORDER BY start_time DESC, id DESC
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to search downloads: {}",
                e
            )))
        })?;

        Ok(handles)
    }

    /// Mark every in-progress record as cancelled
    ///
    /// Called at startup: no transfer survives a restart.
    pub async fn cancel_in_progress_downloads(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE downloads SET state = ? WHERE state = ?")
            .bind(DownloadState::Cancelled.to_i32())
            .bind(DownloadState::InProgress.to_i32())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to clean up in-progress downloads: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected())
    }
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
