//! Finished transfers and the dangerous-download protocol
//!
//! A download counts as finished once bytes stopped arriving *and* it has a
//! history handle. The two happen in either order; whichever comes second
//! runs [`DownloadManager::on_download_complete`], so the completion chain
//! fires exactly once.

use crate::error::{DownloadError, Result};
use crate::types::{DownloadId, DownloadState, Event, ItemKey, SafetyState};
use crate::utils::DangerousRename;

use super::{DownloadManager, FileTask, HistoryRequest};

impl DownloadManager {
    /// The transfer engine wrote the last byte
    ///
    /// May arrive before the item exists (while the user is still choosing a
    /// path); the size is then buffered and replayed on creation. Completions
    /// for ids that are not starting or in progress are dropped.
    pub fn download_finished(&mut self, id: DownloadId, size: u64) {
        let Some(key) = self.index.in_progress_key(id) else {
            if self.index.is_starting(id) {
                tracing::debug!(download_id = id.0, size, "finished before start, buffering");
                self.index.buffer_finished(id, size);
            } else {
                // Already finished, cancelled or removed
                tracing::debug!(download_id = id.0, size, "late completion dropped");
            }
            return;
        };
        self.index.take_pending_finished(id);

        let Some(item) = self.index.get_mut(key) else {
            return;
        };
        if item.state() != DownloadState::InProgress {
            return;
        }
        item.finished(size);
        let assigned = item.db_handle().is_assigned();

        tracing::info!(download_id = id.0, size, "download finished");

        if assigned {
            self.index.leave_in_progress(id);
            self.sync_history(key);
            self.on_download_complete(key);
        }
    }

    /// Completion chain for an item that is finished and persisted
    pub(super) fn on_download_complete(&mut self, key: ItemKey) {
        let Some(item) = self.index.get(key) else {
            return;
        };
        let id = item.id();
        let handle = item.db_handle();
        let safety = item.safety_state();
        let path = item.full_path().to_path_buf();
        let original_name = item.original_name().to_path_buf();

        let _ = self.events.send(Event::DownloadCompleted {
            key,
            db_handle: handle,
            path: path.clone(),
        });

        match safety {
            SafetyState::Dangerous => {
                tracing::info!(download_id = id.0, "dangerous download awaiting approval");
                self.index.mark_dangerous_finished(id, key);
            }
            SafetyState::DangerousButValidated => {
                self.contexts.post_file(FileTask::ProceedWithFinishedDangerous {
                    db_handle: handle,
                    path,
                    original_name,
                });
            }
            SafetyState::Safe => self.continue_download_finished(key),
        }
    }

    /// Last step of completion: auto-open if wanted
    pub(super) fn continue_download_finished(&mut self, key: ItemKey) {
        let Some(item) = self.index.get(key) else {
            return;
        };
        let id = item.id();
        let path = item.full_path().to_path_buf();
        let open = item.open_when_complete() || self.auto_open.should_open(&path, &self.policy);
        self.index.clear_dangerous_finished(id);

        if open {
            tracing::debug!(path = %path.display(), "opening finished download");
            self.contexts.post_file(FileTask::Open(path));
        }
    }

    /// The file-I/O context moved an approved download to its true name
    pub fn dangerous_download_renamed(&mut self, rename: DangerousRename) {
        let Some(key) = self.index.key_for_handle(rename.db_handle) else {
            tracing::warn!(handle = rename.db_handle.0, "rename result for unknown download");
            return;
        };

        if rename.success {
            if let Some(item) = self.index.get_mut(key) {
                item.set_path_uniquifier(rename.uniquifier);
                item.rename(rename.new_path.clone());
            }
            if rename.db_handle.is_persistent() {
                self.contexts.post_history(HistoryRequest::UpdatePath {
                    handle: rename.db_handle,
                    path: rename.new_path,
                });
            }
        }

        self.continue_download_finished(key);
    }

    /// The user approved a dangerous download
    ///
    /// If the bytes are all on disk the file is moved to its true name right
    /// away, otherwise that happens when the download completes.
    pub fn dangerous_download_validated(&mut self, key: ItemKey) -> Result<()> {
        let item = self.item_mut(key)?;
        if item.safety_state() != SafetyState::Dangerous {
            return Err(DownloadError::InvalidState {
                key,
                operation: "validate".into(),
                current_state: format!("{:?}", item.safety_state()),
            }
            .into());
        }
        item.set_safety_state(SafetyState::DangerousButValidated);

        let handle = item.db_handle();
        tracing::info!(download_id = item.id().0, handle = handle.0, "dangerous download approved");

        if item.state() == DownloadState::Complete && handle.is_assigned() {
            let path = item.full_path().to_path_buf();
            let original_name = item.original_name().to_path_buf();
            self.contexts.post_file(FileTask::ProceedWithFinishedDangerous {
                db_handle: handle,
                path,
                original_name,
            });
        }
        Ok(())
    }

    /// The user rejected a dangerous download: remove it and its file
    pub fn discard_dangerous_download(&mut self, key: ItemKey) -> Result<()> {
        let item = self.item(key)?;
        if item.safety_state() != SafetyState::Dangerous {
            return Err(DownloadError::InvalidState {
                key,
                operation: "discard".into(),
                current_state: format!("{:?}", item.safety_state()),
            }
            .into());
        }
        self.remove_download(key, true)
    }
}
