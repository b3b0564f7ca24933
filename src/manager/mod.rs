//! The download manager: the UI-context orchestrator
//!
//! [`DownloadManager`] owns every [`DownloadItem`] and all of the indices over
//! them. It never blocks and never touches the filesystem: probing, renaming,
//! history writes, request control and prompts are posted to the other
//! execution contexts as [`FileTask`], [`HistoryRequest`], [`NetworkCommand`]
//! and [`DialogRequest`] values, and their results come back as
//! [`ManagerMessage`] values handled by [`DownloadManager::handle`].
//!
//! Methods are grouped by concern:
//! - [`start`]: filename generation, path resolution, save-as prompting
//! - [`persistence`]: history load, handle assignment, sync, search, bulk removal
//! - [`completion`]: finished transfers and the dangerous-download protocol
//! - [`control`]: user commands (cancel, pause, remove, open, auto-open)
//! - [`lifecycle`]: init, progress refresh, shutdown

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::collaborators::PageDelegate;
use crate::config::{Config, DownloadConfig};
use crate::error::{DownloadError, Result};
use crate::item::DownloadItem;
use crate::safety::{AutoOpenSet, SafetyPolicy};
use crate::types::{DbHandle, DownloadCreateInfo, DownloadSnapshot, Event, ItemKey};

mod completion;
mod control;
mod index;
mod lifecycle;
mod messages;
mod persistence;
mod start;

use index::DownloadIndex;
pub use lifecycle::ShutdownReport;
pub use messages::{
    ContextReceivers, Contexts, DialogRequest, FileTask, HistoryRequest, ManagerMessage,
    NetworkCommand, Reply,
};

/// Orchestrates every download of one profile
pub struct DownloadManager {
    config: DownloadConfig,
    policy: SafetyPolicy,
    auto_open: AutoOpenSet,
    index: DownloadIndex,
    contexts: Contexts,
    pages: Arc<dyn PageDelegate>,
    events: broadcast::Sender<Event>,
    last_download_path: Option<PathBuf>,
    last_synthetic_handle: i64,
    pending_selections: HashMap<u64, Box<DownloadCreateInfo>>,
    last_selection_token: u64,
    pending_searches: HashMap<u64, Reply<Vec<DownloadSnapshot>>>,
    last_search_request: u64,
    shutdown_needed: bool,
}

impl DownloadManager {
    /// Create a manager posting work to `contexts` and announcing changes on `events`
    pub fn new(
        config: &Config,
        contexts: Contexts,
        pages: Arc<dyn PageDelegate>,
        events: broadcast::Sender<Event>,
    ) -> Self {
        let policy = SafetyPolicy::new(&config.safety);
        let auto_open = AutoOpenSet::from_extensions(&config.safety.auto_open_extensions, &policy);
        Self {
            config: config.download.clone(),
            policy,
            auto_open,
            index: DownloadIndex::default(),
            contexts,
            pages,
            events,
            last_download_path: None,
            last_synthetic_handle: 0,
            pending_selections: HashMap::new(),
            last_selection_token: 0,
            pending_searches: HashMap::new(),
            last_search_request: 0,
            shutdown_needed: false,
        }
    }

    /// React to one message from another context or from the public API
    ///
    /// [`ManagerMessage::Shutdown`] is handled here too; the caller should
    /// stop feeding messages afterwards.
    pub fn handle(&mut self, message: ManagerMessage) {
        match message {
            ManagerMessage::StartDownload(info) => self.start_download(*info),
            ManagerMessage::UpdateDownload { id, bytes_so_far } => {
                self.update_download(id, bytes_so_far)
            }
            ManagerMessage::DownloadFinished { id, size } => self.download_finished(id, size),

            ManagerMessage::PathExistenceAvailable(info) => self.on_path_existence_available(*info),
            ManagerMessage::DangerousDownloadRenamed(rename) => {
                self.dangerous_download_renamed(rename)
            }

            ManagerMessage::QueryComplete(records) => {
                self.on_query_download_entries_complete(records)
            }
            ManagerMessage::CreateComplete { info, handle } => {
                self.on_create_download_entry_complete(*info, handle)
            }
            ManagerMessage::SearchComplete { request, handles } => {
                self.on_search_complete(request, handles)
            }
            ManagerMessage::AutoOpenLoaded(extensions) => self.on_auto_open_loaded(extensions),

            ManagerMessage::FileSelected { token, path } => self.file_selected(token, path),
            ManagerMessage::FileSelectionCanceled { token } => self.file_selection_canceled(token),

            ManagerMessage::Cancel(key, reply) => {
                let _ = reply.send(self.cancel_download(key));
            }
            ManagerMessage::TogglePause(key, reply) => {
                let _ = reply.send(self.toggle_pause(key));
            }
            ManagerMessage::Remove {
                key,
                delete_file,
                reply,
            } => {
                let _ = reply.send(self.remove_download(key, delete_file));
            }
            ManagerMessage::Validate(key, reply) => {
                let _ = reply.send(self.dangerous_download_validated(key));
            }
            ManagerMessage::Discard(key, reply) => {
                let _ = reply.send(self.discard_dangerous_download(key));
            }
            ManagerMessage::SetOpenWhenComplete { key, open, reply } => {
                let _ = reply.send(self.set_open_when_complete(key, open));
            }
            ManagerMessage::Open(key, reply) => {
                let _ = reply.send(self.open_download(key));
            }
            ManagerMessage::ShowInFolder(key, reply) => {
                let _ = reply.send(self.show_download_in_folder(key));
            }
            ManagerMessage::OpenFilesOfExtension {
                extension,
                open,
                reply,
            } => {
                let _ = reply.send(self.open_files_of_extension(&extension, open));
            }
            ManagerMessage::ResetAutoOpenFiles(reply) => {
                self.reset_auto_open_files();
                let _ = reply.send(());
            }
            ManagerMessage::ClearLastDownloadPath(reply) => {
                self.clear_last_download_path();
                let _ = reply.send(());
            }

            ManagerMessage::Downloads(reply) => {
                let _ = reply.send(self.downloads());
            }
            ManagerMessage::Search { text, reply } => self.search_downloads(text, reply),
            ManagerMessage::InProgressCount(reply) => {
                let _ = reply.send(self.in_progress_count());
            }
            ManagerMessage::RemoveBetween { begin, end, reply } => {
                let _ = reply.send(self.remove_downloads_between(begin, end));
            }

            ManagerMessage::Shutdown(reply) => {
                let _ = reply.send(self.shutdown());
            }
        }
    }

    /// Every persisted download, newest first
    pub fn downloads(&self) -> Vec<DownloadSnapshot> {
        let mut snapshots: Vec<DownloadSnapshot> = self
            .index
            .persisted_items()
            .map(DownloadItem::snapshot)
            .collect();
        sort_newest_first(&mut snapshots);
        snapshots
    }

    /// Snapshot of one item, if it is still known
    pub fn download(&self, key: ItemKey) -> Option<DownloadSnapshot> {
        self.index.get(key).map(DownloadItem::snapshot)
    }

    /// Snapshot of a persisted item by handle
    pub fn download_by_handle(&self, handle: DbHandle) -> Option<DownloadSnapshot> {
        self.index
            .key_for_handle(handle)
            .and_then(|key| self.download(key))
    }

    /// Number of transfers not yet finished or not yet persisted
    pub fn in_progress_count(&self) -> usize {
        self.index.in_progress_count()
    }

    /// Directory of the last path the user chose in a save-as prompt
    pub fn last_download_path(&self) -> Option<&PathBuf> {
        self.last_download_path.as_ref()
    }

    /// Forget the last save-as directory
    pub fn clear_last_download_path(&mut self) {
        self.last_download_path = None;
    }

    /// Extensions opened automatically
    pub fn auto_open_extensions(&self) -> Vec<String> {
        self.auto_open.iter().map(str::to_string).collect()
    }

    /// Whether [`DownloadManager::shutdown`] still has to run
    pub fn shutdown_needed(&self) -> bool {
        self.shutdown_needed
    }

    fn item(&self, key: ItemKey) -> Result<&DownloadItem> {
        self.index
            .get(key)
            .ok_or_else(|| DownloadError::NotFound { key }.into())
    }

    fn item_mut(&mut self, key: ItemKey) -> Result<&mut DownloadItem> {
        self.index
            .get_mut(key)
            .ok_or_else(|| DownloadError::NotFound { key }.into())
    }

    fn model_changed(&self) {
        let _ = self.events.send(Event::ModelChanged);
    }

    fn next_synthetic_handle(&mut self) -> DbHandle {
        self.last_synthetic_handle -= 1;
        DbHandle(self.last_synthetic_handle)
    }
}

fn sort_newest_first(snapshots: &mut [DownloadSnapshot]) {
    snapshots.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then(b.db_handle.cmp(&a.db_handle))
    });
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
