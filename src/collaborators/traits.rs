//! Interfaces of the components the manager talks to

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{DbHandle, DownloadId, DownloadRecord, DownloadSnapshot, DownloadState, RequestOwner};

/// Disk side of the byte-transfer engine
///
/// Every method runs on the file-I/O context and may block.
pub trait FileEngine: Send + Sync {
    /// Make sure the download directory exists
    fn create_directory(&self, path: &Path) -> std::io::Result<()>;

    /// The path a transfer writes to is now final
    fn on_final_download_name(&self, id: DownloadId, path: &Path);

    /// Discard partial-transfer bookkeeping for a cancelled download
    fn cancel_download(&self, id: DownloadId);

    /// Delete a file from disk
    fn delete_file(&self, path: &Path) -> std::io::Result<()>;

    /// Forget a download entirely
    fn remove_download(&self, id: DownloadId);
}

/// Persistent download history
///
/// Handles are assigned by [`HistoryStore::create_download`] and are always
/// positive.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Every stored record, newest first
    async fn query_downloads(&self) -> Result<Vec<DownloadRecord>>;

    /// Store a new record and return its handle
    async fn create_download(&self, record: &DownloadRecord) -> Result<DbHandle>;

    /// Update progress and state of a record
    async fn update_download(
        &self,
        handle: DbHandle,
        received_bytes: u64,
        state: DownloadState,
    ) -> Result<()>;

    /// Update the on-disk path of a record
    async fn update_download_path(&self, handle: DbHandle, path: &Path) -> Result<()>;

    /// Delete one record
    async fn remove_download(&self, handle: DbHandle) -> Result<()>;

    /// Delete finished records started in `[begin, end)` (`end = None` means open-ended)
    async fn remove_downloads_between(
        &self,
        begin: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Handles of records whose URL or path contains `text`
    async fn search_downloads(&self, text: &str) -> Result<Vec<DbHandle>>;

    /// Mark rows left in progress by a previous process as cancelled
    async fn clean_up_in_progress_entries(&self) -> Result<()>;

    /// Extensions registered for automatic opening, `None` if never saved
    async fn load_auto_open(&self) -> Result<Option<Vec<String>>> {
        Ok(None)
    }

    /// Persist the auto-open extensions
    async fn save_auto_open(&self, _extensions: &[String]) -> Result<()> {
        Ok(())
    }
}

/// Owner of the live network requests
///
/// Runs on the network context.
pub trait RequestController: Send + Sync {
    /// Abort the request behind a download
    fn cancel_request(&self, owner: RequestOwner);

    /// Stop or resume reading from the request
    fn pause_request(&self, owner: RequestOwner, pause: bool);
}

/// Interactive "save as" prompt
#[async_trait]
pub trait SaveAsDialog: Send + Sync {
    /// Ask the user where to save; `None` when the prompt is dismissed
    async fn select_file(&self, suggested_path: &Path, owner: RequestOwner) -> Option<PathBuf>;
}

/// Browser pages that show the download shelf
///
/// Called from the UI context; must not block.
pub trait PageDelegate: Send + Sync {
    /// Whether the page that issued the request still exists and is active
    fn originating_page_active(&self, owner: RequestOwner) -> bool;

    /// Show a new download in the page that started it
    fn show_in_page(&self, owner: RequestOwner, download: &DownloadSnapshot);

    /// Show a new download in the current page of the last active window.
    /// Returns `false` when no window is open.
    fn show_in_last_active_window(&self, download: &DownloadSnapshot) -> bool;
}

/// Desktop shell integration
///
/// Runs on the file-I/O context.
pub trait Shell: Send + Sync {
    /// Open a file with its default application
    fn open_item(&self, path: &Path) -> std::io::Result<()>;

    /// Reveal a file in the system file browser
    fn show_item_in_folder(&self, path: &Path) -> std::io::Result<()>;
}
