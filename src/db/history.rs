//! The SQLite database as the manager's history store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

use crate::Result;
use crate::collaborators::HistoryStore;
use crate::types::{DbHandle, DownloadRecord, DownloadState};

use super::Database;

#[async_trait]
impl HistoryStore for Database {
    async fn query_downloads(&self) -> Result<Vec<DownloadRecord>> {
        self.list_downloads().await
    }

    async fn create_download(&self, record: &DownloadRecord) -> Result<DbHandle> {
        self.insert_download(record).await
    }

    async fn update_download(
        &self,
        handle: DbHandle,
        received_bytes: u64,
        state: DownloadState,
    ) -> Result<()> {
        self.update_download_progress(handle, received_bytes, state)
            .await
    }

    async fn update_download_path(&self, handle: DbHandle, path: &Path) -> Result<()> {
        self.set_download_path(handle, path).await
    }

    async fn remove_download(&self, handle: DbHandle) -> Result<()> {
        self.delete_download(handle).await
    }

    async fn remove_downloads_between(
        &self,
        begin: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let removed = self.delete_downloads_between(begin, end).await?;
        tracing::debug!(removed, "removed history rows in range");
        Ok(())
    }

    async fn search_downloads(&self, text: &str) -> Result<Vec<DbHandle>> {
        Database::search_downloads(self, text).await
    }

    async fn clean_up_in_progress_entries(&self) -> Result<()> {
        let cancelled = self.cancel_in_progress_downloads().await?;
        if cancelled > 0 {
            tracing::info!(cancelled, "marked interrupted downloads as cancelled");
        }
        Ok(())
    }

    async fn load_auto_open(&self) -> Result<Option<Vec<String>>> {
        self.get_auto_open_extensions().await
    }

    async fn save_auto_open(&self, extensions: &[String]) -> Result<()> {
        self.set_auto_open_extensions(extensions).await
    }
}
