//! Startup, periodic refresh and shutdown

use std::collections::HashSet;

use crate::types::{DownloadState, Event, ItemKey, SafetyState};

use super::{DownloadManager, FileTask, HistoryRequest};

/// What [`DownloadManager::shutdown`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Active downloads that were cancelled
    pub cancelled: usize,
    /// Unapproved dangerous downloads whose files were deleted
    pub discarded_dangerous: usize,
}

impl DownloadManager {
    /// Bring the manager up: create the download directory and load history
    ///
    /// Must be paired with [`DownloadManager::shutdown`].
    pub fn init(&mut self) {
        self.shutdown_needed = true;
        self.contexts
            .post_file(FileTask::CreateDirectory(self.config.download_dir.clone()));

        if self.config.off_the_record {
            tracing::info!("off-the-record session, history disabled");
            return;
        }
        self.contexts.post_history(HistoryRequest::CleanUpInProgress);
        self.contexts.post_history(HistoryRequest::Query);
        self.contexts.post_history(HistoryRequest::LoadAutoOpen);
    }

    /// Refresh observers of every active download
    pub fn on_progress_tick(&self) {
        for key in self.index.in_progress_keys() {
            if let Some(item) = self.index.get(key) {
                item.on_progress_tick();
            }
        }
    }

    /// Stop the manager
    ///
    /// Cancels every active download and deletes the files of dangerous
    /// downloads nobody approved. Items are destroyed; persisted records keep
    /// their final state.
    ///
    /// # Panics
    ///
    /// If [`DownloadManager::init`] was not called or shutdown already ran.
    pub fn shutdown(&mut self) -> ShutdownReport {
        assert!(self.shutdown_needed, "shutdown without a matching init");

        let mut report = ShutdownReport::default();
        let mut handled: HashSet<ItemKey> = HashSet::new();

        for key in self.index.in_progress_keys() {
            handled.insert(key);
            let Some(item) = self.index.get_mut(key) else {
                continue;
            };
            let handle = item.db_handle();

            // Never persisted and never approved: the temporary file goes
            if item.safety_state() == SafetyState::Dangerous && !handle.is_assigned() {
                item.cancel();
                let path = item.full_path().to_path_buf();
                self.contexts.post_file(FileTask::DeleteFile(path));
                self.index.destroy(key);
                report.discarded_dangerous += 1;
                continue;
            }

            if item.state() == DownloadState::InProgress {
                item.cancel();
                report.cancelled += 1;
                self.contexts.post_file(FileTask::CancelDownload(item.id()));
            }
            self.sync_history(key);
            if !handle.is_assigned() {
                self.index.destroy(key);
            }
        }

        for key in self.index.dangerous_finished_keys() {
            if handled.contains(&key) {
                continue;
            }
            let Some(item) = self.index.get(key) else {
                continue;
            };
            if item.safety_state() != SafetyState::Dangerous {
                continue;
            }
            let handle = item.db_handle();
            self.contexts
                .post_file(FileTask::DeleteFile(item.full_path().to_path_buf()));
            if handle.is_persistent() {
                self.contexts.post_history(HistoryRequest::Remove(handle));
            }
            self.index.destroy(key);
            report.discarded_dangerous += 1;
        }

        self.pending_selections.clear();
        self.pending_searches.clear();
        self.index.clear();
        self.save_auto_open();

        let _ = self.events.send(Event::Shutdown);
        self.shutdown_needed = false;

        tracing::info!(
            cancelled = report.cancelled,
            discarded_dangerous = report.discarded_dangerous,
            "download manager shut down"
        );
        report
    }
}
