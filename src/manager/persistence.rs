//! History: restoring, handle assignment, syncing, search and bulk removal

use chrono::{DateTime, Utc};

use crate::item::DownloadItem;
use crate::safety::AutoOpenSet;
use crate::types::{
    DbHandle, DownloadCreateInfo, DownloadId, DownloadRecord, DownloadSnapshot, DownloadState,
    ItemKey,
};

use super::{DownloadManager, HistoryRequest, Reply, sort_newest_first};

impl DownloadManager {
    /// Bytes arrived for a live transfer
    pub fn update_download(&mut self, id: DownloadId, bytes_so_far: u64) {
        let Some(key) = self.index.in_progress_key(id) else {
            // Finished or cancelled in the meantime
            return;
        };
        let Some(item) = self.index.get_mut(key) else {
            return;
        };
        if item.state() != DownloadState::InProgress {
            return;
        }
        item.update(bytes_so_far);
        self.sync_history(key);
    }

    /// Stored records arrived from the history context
    pub fn on_query_download_entries_complete(&mut self, records: Vec<DownloadRecord>) {
        let total = records.len();
        let mut restored = 0usize;
        for record in &records {
            let key = self.index.allocate_key();
            let item = DownloadItem::from_record(key, record, self.events.clone());
            if self.index.insert_restored(item) {
                restored += 1;
            } else {
                tracing::warn!(handle = record.db_handle.0, "duplicate history record skipped");
            }
        }
        tracing::debug!(restored, total, "history loaded");
        self.model_changed();
    }

    /// The history store created a record for a download
    ///
    /// This is where the download becomes persisted. Anything that happened
    /// to it while the record was being written (completion, cancel) is
    /// synced now.
    pub fn on_create_download_entry_complete(&mut self, info: DownloadCreateInfo, handle: DbHandle) {
        let Some(key) = self.index.in_progress_key(info.download_id) else {
            tracing::warn!(
                download_id = info.download_id.0,
                handle = handle.0,
                "history record created for unknown download"
            );
            if handle.is_persistent() {
                self.contexts.post_history(HistoryRequest::Remove(handle));
            }
            return;
        };

        self.index.assign_handle(key, handle);
        tracing::debug!(download_id = info.download_id.0, handle = handle.0, "download persisted");

        if let Some(item) = self.index.get(key) {
            let snapshot = item.snapshot();
            if self.pages.originating_page_active(info.owner) {
                self.pages.show_in_page(info.owner, &snapshot);
            } else if !self.pages.show_in_last_active_window(&snapshot) {
                tracing::debug!(download_id = info.download_id.0, "no window to show download in");
            }
        }
        self.model_changed();

        let Some(state) = self.index.get(key).map(DownloadItem::state) else {
            return;
        };
        if state.is_terminal() {
            self.index.leave_in_progress(info.download_id);
            self.sync_history(key);
            if let Some(item) = self.index.get(key) {
                item.notify();
            }
            if state == DownloadState::Complete {
                self.on_download_complete(key);
            }
        }
    }

    /// Search results arrived from the history context
    pub fn on_search_complete(&mut self, request: u64, handles: Vec<DbHandle>) {
        let Some(reply) = self.pending_searches.remove(&request) else {
            tracing::warn!(request, "search result for unknown request");
            return;
        };
        let mut found: Vec<DownloadSnapshot> = handles
            .into_iter()
            .filter_map(|handle| self.download_by_handle(handle))
            .collect();
        sort_newest_first(&mut found);
        let _ = reply.send(found);
    }

    /// Stored auto-open registrations arrived
    pub fn on_auto_open_loaded(&mut self, extensions: Option<Vec<String>>) {
        if let Some(extensions) = extensions {
            self.auto_open = AutoOpenSet::from_extensions(&extensions, &self.policy);
            tracing::debug!(count = self.auto_open.len(), "auto-open extensions loaded");
        }
    }

    /// Persisted downloads whose URL or path contains `text`
    ///
    /// Answered on `reply` once the history context has searched; an empty
    /// text answers immediately with everything.
    pub fn search_downloads(&mut self, text: String, reply: Reply<Vec<DownloadSnapshot>>) {
        if text.is_empty() {
            let _ = reply.send(self.downloads());
            return;
        }
        self.last_search_request += 1;
        let request = self.last_search_request;
        self.pending_searches.insert(request, reply);
        self.contexts
            .post_history(HistoryRequest::Search { request, text });
    }

    /// Remove finished downloads that started in `[begin, end)`
    ///
    /// `end = None` is open-ended. In-progress downloads are never touched.
    /// Returns the number of items removed.
    pub fn remove_downloads_between(
        &mut self,
        begin: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> usize {
        self.contexts
            .post_history(HistoryRequest::RemoveBetween { begin, end });

        // Compared at the history store's precision so both purge the same items
        let begin_us = begin.timestamp_micros();
        let end_us = end.map(|end| end.timestamp_micros());
        let doomed: Vec<ItemKey> = self
            .index
            .persisted_items()
            .filter(|item| {
                let start_us = item.start_time().timestamp_micros();
                start_us >= begin_us
                    && end_us.is_none_or(|end_us| start_us < end_us)
                    && item.state().is_terminal()
            })
            .map(DownloadItem::key)
            .collect();

        for key in &doomed {
            self.index.destroy(*key);
        }

        tracing::debug!(removed = doomed.len(), "removed downloads in range");
        self.model_changed();
        doomed.len()
    }

    /// Remove finished downloads that started at or after `begin`
    pub fn remove_downloads(&mut self, begin: DateTime<Utc>) -> usize {
        self.remove_downloads_between(begin, None)
    }

    /// Remove every finished download
    pub fn remove_all_downloads(&mut self) -> usize {
        self.remove_downloads_between(DateTime::<Utc>::UNIX_EPOCH, None)
    }

    /// Write an item's progress and state to history, if it has a record
    pub(super) fn sync_history(&self, key: ItemKey) {
        let Some(item) = self.index.get(key) else {
            return;
        };
        let handle = item.db_handle();
        if !handle.is_persistent() {
            return;
        }
        self.contexts.post_history(HistoryRequest::Update {
            handle,
            received_bytes: item.received_bytes(),
            state: item.state(),
        });
    }
}
