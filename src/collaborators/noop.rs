//! Collaborators for headless use
//!
//! Used when the embedder has no windows, no live requests or no store to
//! offer. Nothing here fails.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use super::traits::{HistoryStore, PageDelegate, RequestController, SaveAsDialog, Shell};
use crate::error::Result;
use crate::types::{DbHandle, DownloadRecord, DownloadSnapshot, DownloadState, RequestOwner};

/// Request controller with no requests behind it
pub struct NoOpRequestController;

impl RequestController for NoOpRequestController {
    fn cancel_request(&self, owner: RequestOwner) {
        tracing::trace!(request_id = owner.request_id, "no request to cancel");
    }

    fn pause_request(&self, owner: RequestOwner, pause: bool) {
        tracing::trace!(request_id = owner.request_id, pause, "no request to pause");
    }
}

/// Save-as prompt that is always dismissed
pub struct NoOpSaveAsDialog;

#[async_trait]
impl SaveAsDialog for NoOpSaveAsDialog {
    async fn select_file(&self, _suggested_path: &Path, _owner: RequestOwner) -> Option<PathBuf> {
        None
    }
}

/// No windows at all
pub struct NoOpPageDelegate;

impl PageDelegate for NoOpPageDelegate {
    fn originating_page_active(&self, _owner: RequestOwner) -> bool {
        false
    }

    fn show_in_page(&self, _owner: RequestOwner, _download: &DownloadSnapshot) {}

    fn show_in_last_active_window(&self, _download: &DownloadSnapshot) -> bool {
        false
    }
}

/// Shell that opens nothing
pub struct NoOpShell;

impl Shell for NoOpShell {
    fn open_item(&self, path: &Path) -> std::io::Result<()> {
        tracing::debug!(path = %path.display(), "shell open skipped");
        Ok(())
    }

    fn show_item_in_folder(&self, path: &Path) -> std::io::Result<()> {
        tracing::debug!(path = %path.display(), "show in folder skipped");
        Ok(())
    }
}

/// History store that remembers nothing
///
/// Hands out fresh handles so downloads complete normally, but loses every
/// record on drop.
#[derive(Default)]
pub struct NoOpHistoryStore {
    last_handle: AtomicI64,
}

#[async_trait]
impl HistoryStore for NoOpHistoryStore {
    async fn query_downloads(&self) -> Result<Vec<DownloadRecord>> {
        Ok(Vec::new())
    }

    async fn create_download(&self, _record: &DownloadRecord) -> Result<DbHandle> {
        Ok(DbHandle(self.last_handle.fetch_add(1, Ordering::Relaxed) + 1))
    }

    async fn update_download(
        &self,
        _handle: DbHandle,
        _received_bytes: u64,
        _state: DownloadState,
    ) -> Result<()> {
        Ok(())
    }

    async fn update_download_path(&self, _handle: DbHandle, _path: &Path) -> Result<()> {
        Ok(())
    }

    async fn remove_download(&self, _handle: DbHandle) -> Result<()> {
        Ok(())
    }

    async fn remove_downloads_between(
        &self,
        _begin: DateTime<Utc>,
        _end: Option<DateTime<Utc>>,
    ) -> Result<()> {
        Ok(())
    }

    async fn search_downloads(&self, _text: &str) -> Result<Vec<DbHandle>> {
        Ok(Vec::new())
    }

    async fn clean_up_in_progress_entries(&self) -> Result<()> {
        Ok(())
    }
}
