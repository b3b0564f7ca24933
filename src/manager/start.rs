//! Starting a download: naming, path resolution and the save-as prompt

use std::path::PathBuf;

use crate::filename::generate_filename;
use crate::item::DownloadItem;
use crate::types::DownloadCreateInfo;

use super::{DialogRequest, DownloadManager, FileTask, HistoryRequest, NetworkCommand};

impl DownloadManager {
    /// A new transfer began
    ///
    /// Picks a file name and directory, then hands the path to the file-I/O
    /// context for probing; the answer arrives as
    /// [`DownloadManager::on_path_existence_available`].
    pub fn start_download(&mut self, mut info: DownloadCreateInfo) {
        let generated = generate_filename(
            &info.url,
            info.content_disposition.as_deref(),
            &info.mime_type,
            &self.policy,
        );

        // Types the user asked to open automatically skip the prompt
        if self.config.prompt_for_download && !self.auto_open.should_open(&generated, &self.policy)
        {
            info.save_as = true;
        }

        let dir = match (&self.last_download_path, info.save_as) {
            (Some(last), true) => last.clone(),
            _ => self.config.download_dir.clone(),
        };
        info.suggested_path = dir.join(&generated);

        tracing::debug!(
            download_id = info.download_id.0,
            url = %info.url,
            path = %info.suggested_path.display(),
            save_as = info.save_as,
            "download started"
        );

        self.index.begin_starting(info.download_id);
        self.contexts
            .post_file(FileTask::CheckSuggestedPath(Box::new(info)));
    }

    /// Path probing finished on the file-I/O context
    pub fn on_path_existence_available(&mut self, info: DownloadCreateInfo) {
        if !info.save_as {
            let target = info.suggested_path.clone();
            self.continue_start_download(info, target);
            return;
        }

        self.last_selection_token += 1;
        let token = self.last_selection_token;
        self.contexts.post_dialog(DialogRequest {
            token,
            suggested_path: info.suggested_path.clone(),
            owner: info.owner,
        });
        self.pending_selections.insert(token, Box::new(info));
    }

    /// The user picked where to save
    pub fn file_selected(&mut self, token: u64, path: PathBuf) {
        let Some(info) = self.pending_selections.remove(&token) else {
            tracing::warn!(token, "file selected for unknown prompt");
            return;
        };

        if self.config.prompt_for_download
            && let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty())
        {
            self.last_download_path = Some(dir.to_path_buf());
        }

        self.continue_start_download(*info, path);
    }

    /// The user dismissed the prompt: the transfer is abandoned
    pub fn file_selection_canceled(&mut self, token: u64) {
        let Some(info) = self.pending_selections.remove(&token) else {
            tracing::warn!(token, "selection canceled for unknown prompt");
            return;
        };

        tracing::debug!(download_id = info.download_id.0, "save-as prompt dismissed");
        self.index.abandon_starting(info.download_id);
        self.contexts
            .post_file(FileTask::CancelDownload(info.download_id));
        self.contexts
            .post_network(NetworkCommand::Cancel(info.owner));
    }

    /// Create the item once its target path is final
    ///
    /// # Panics
    ///
    /// If a download with the same id is already in progress.
    pub fn continue_start_download(&mut self, mut info: DownloadCreateInfo, target_path: PathBuf) {
        info.path = target_path;

        let key = self.index.allocate_key();
        let item = DownloadItem::new(key, &info, self.config.off_the_record, self.events.clone());
        self.index.insert_in_progress(item);

        // Sent before any replayed completion so the engine renames first
        self.contexts.post_file(FileTask::FinalDownloadName {
            id: info.download_id,
            path: info.path.clone(),
        });

        if let Some(size) = self.index.pending_finished_size(info.download_id) {
            tracing::debug!(download_id = info.download_id.0, size, "replaying early completion");
            self.download_finished(info.download_id, size);
        }

        if let Some(item) = self.index.get(key) {
            item.notify();
        }

        if self.config.off_the_record {
            let handle = self.next_synthetic_handle();
            self.on_create_download_entry_complete(info, handle);
        } else {
            self.contexts
                .post_history(HistoryRequest::Create(Box::new(info)));
        }
    }
}
