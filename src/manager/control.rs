//! User commands on individual downloads and on the auto-open set

use crate::error::{DownloadError, Result};
use crate::types::{DownloadState, ItemKey, SafetyState};

use super::{DownloadManager, FileTask, HistoryRequest, NetworkCommand};

impl DownloadManager {
    /// Stop an active download
    ///
    /// Cancelling a download that already finished is a no-op.
    pub fn cancel_download(&mut self, key: ItemKey) -> Result<()> {
        if self.item_mut(key)?.cancel() {
            self.download_cancelled(key);
        }
        Ok(())
    }

    /// Propagate a cancel that just happened on an item
    fn download_cancelled(&mut self, key: ItemKey) {
        let Some(item) = self.index.get(key) else {
            return;
        };
        let id = item.id();
        let owner = item.owner();
        tracing::info!(download_id = id.0, "download cancelled");

        // Without a handle the record is still being created; the cancel is
        // synced once it arrives
        if item.db_handle().is_assigned() {
            self.index.leave_in_progress(id);
            self.sync_history(key);
        }

        self.contexts.post_file(FileTask::RemoveDownload(id));
        self.contexts.post_file(FileTask::CancelDownload(id));
        self.contexts.post_network(NetworkCommand::Cancel(owner));
    }

    /// Pause or resume an active download. Returns the new paused state.
    pub fn toggle_pause(&mut self, key: ItemKey) -> Result<bool> {
        let item = self.item_mut(key)?;
        if item.state() != DownloadState::InProgress {
            return Err(DownloadError::InvalidState {
                key,
                operation: "pause".into(),
                current_state: format!("{:?}", item.state()),
            }
            .into());
        }
        let owner = item.owner();
        let pause = !item.is_paused();
        self.contexts
            .post_network(NetworkCommand::Pause { owner, pause });

        let paused = self.item_mut(key)?.toggle_pause();
        tracing::debug!(key = key.0, paused, "pause toggled");
        Ok(paused)
    }

    /// Remove a download from every list, optionally deleting its file
    pub fn remove_download(&mut self, key: ItemKey, delete_file: bool) -> Result<()> {
        if self.item_mut(key)?.cancel() {
            self.download_cancelled(key);
        }
        self.item_mut(key)?.remove();

        let item = self.item(key)?;
        let handle = item.db_handle();
        let path = item.full_path().to_path_buf();
        tracing::info!(download_id = item.id().0, handle = handle.0, delete_file, "download removed");

        if handle.is_persistent() {
            self.contexts.post_history(HistoryRequest::Remove(handle));
        }
        if delete_file {
            self.contexts.post_file(FileTask::DeleteFile(path));
        }

        self.index.destroy(key);
        self.model_changed();
        Ok(())
    }

    /// Set whether the download is opened once it finishes
    pub fn set_open_when_complete(&mut self, key: ItemKey, open: bool) -> Result<()> {
        self.item_mut(key)?.set_open_when_complete(open);
        Ok(())
    }

    /// Open a finished download with its default application
    pub fn open_download(&mut self, key: ItemKey) -> Result<()> {
        let item = self.item(key)?;
        if item.state() != DownloadState::Complete
            || item.safety_state() == SafetyState::Dangerous
        {
            return Err(DownloadError::InvalidState {
                key,
                operation: "open".into(),
                current_state: format!("{:?}/{:?}", item.state(), item.safety_state()),
            }
            .into());
        }
        self.contexts
            .post_file(FileTask::Open(item.full_path().to_path_buf()));
        Ok(())
    }

    /// Reveal a download in the system file browser
    pub fn show_download_in_folder(&mut self, key: ItemKey) -> Result<()> {
        let path = self.item(key)?.full_path().to_path_buf();
        self.contexts.post_file(FileTask::ShowInFolder(path));
        Ok(())
    }

    /// Register (`open = true`) or unregister an extension for automatic
    /// opening. Returns whether the set changed.
    pub fn open_files_of_extension(&mut self, extension: &str, open: bool) -> Result<bool> {
        let changed = if open {
            self.auto_open.insert(extension, &self.policy)?
        } else {
            self.auto_open.remove(extension)
        };
        if changed {
            tracing::debug!(extension, open, "auto-open set changed");
            self.save_auto_open();
        }
        Ok(changed)
    }

    /// Forget every auto-open registration
    pub fn reset_auto_open_files(&mut self) {
        self.auto_open.clear();
        self.save_auto_open();
    }

    pub(super) fn save_auto_open(&self) {
        if self.config.off_the_record {
            return;
        }
        self.contexts
            .post_history(HistoryRequest::SaveAutoOpen(self.auto_open_extensions()));
    }
}
