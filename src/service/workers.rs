//! Tasks running the non-UI execution contexts
//!
//! Each context drains its own FIFO queue. Answers go back to the UI context
//! as [`ManagerMessage`] values; if the UI context is gone they are dropped.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::collaborators::{FileEngine, HistoryStore, RequestController, SaveAsDialog, Shell};
use crate::manager::{
    DialogRequest, DownloadManager, FileTask, HistoryRequest, ManagerMessage, NetworkCommand,
};
use crate::safety::SafetyPolicy;
use crate::types::DownloadRecord;
use crate::utils::{check_if_suggested_path_exists, proceed_with_finished_dangerous_download};

type Inbox = mpsc::UnboundedSender<ManagerMessage>;

fn answer(inbox: &Inbox, message: ManagerMessage) {
    if inbox.send(message).is_err() {
        tracing::debug!("UI context is gone, dropping answer");
    }
}

/// The UI context: owns the manager and serializes everything it does
pub(super) async fn run_ui_context(
    mut manager: DownloadManager,
    mut inbox: mpsc::UnboundedReceiver<ManagerMessage>,
    progress_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(progress_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            message = inbox.recv() => match message {
                Some(ManagerMessage::Shutdown(reply)) => {
                    let _ = reply.send(manager.shutdown());
                    break;
                }
                Some(message) => manager.handle(message),
                None => break,
            },
            _ = ticker.tick() => manager.on_progress_tick(),
            _ = cancel.cancelled() => break,
        }
    }

    if manager.shutdown_needed() {
        tracing::warn!("UI context stopped without an orderly shutdown");
        manager.shutdown();
    }
}

/// Everything blocking file work needs
#[derive(Clone)]
pub(super) struct FileContext {
    pub(super) engine: Arc<dyn FileEngine>,
    pub(super) shell: Arc<dyn Shell>,
    pub(super) documents_dir: PathBuf,
    pub(super) policy: SafetyPolicy,
}

impl FileContext {
    fn perform(&self, task: FileTask) -> Option<ManagerMessage> {
        match task {
            FileTask::CreateDirectory(dir) => {
                if let Err(e) = self.engine.create_directory(&dir) {
                    tracing::error!(dir = %dir.display(), error = %e, "failed to create download directory");
                }
                None
            }
            FileTask::CheckSuggestedPath(info) => {
                let info = check_if_suggested_path_exists(*info, &self.documents_dir, &self.policy);
                Some(ManagerMessage::PathExistenceAvailable(Box::new(info)))
            }
            FileTask::FinalDownloadName { id, path } => {
                self.engine.on_final_download_name(id, &path);
                None
            }
            FileTask::CancelDownload(id) => {
                self.engine.cancel_download(id);
                None
            }
            FileTask::RemoveDownload(id) => {
                self.engine.remove_download(id);
                None
            }
            FileTask::DeleteFile(path) => {
                if let Err(e) = self.engine.delete_file(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to delete download");
                }
                None
            }
            FileTask::ProceedWithFinishedDangerous {
                db_handle,
                path,
                original_name,
            } => {
                let rename = proceed_with_finished_dangerous_download(db_handle, &path, &original_name);
                Some(ManagerMessage::DangerousDownloadRenamed(rename))
            }
            FileTask::Open(path) => {
                if let Err(e) = self.shell.open_item(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to open download");
                }
                None
            }
            FileTask::ShowInFolder(path) => {
                if let Err(e) = self.shell.show_item_in_folder(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to show download");
                }
                None
            }
        }
    }
}

/// The file-I/O context: one blocking task at a time, in order
pub(super) async fn run_file_context(
    mut tasks: mpsc::UnboundedReceiver<FileTask>,
    context: FileContext,
    inbox: Inbox,
) {
    while let Some(task) = tasks.recv().await {
        let context = context.clone();
        match tokio::task::spawn_blocking(move || context.perform(task)).await {
            Ok(Some(message)) => answer(&inbox, message),
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "file task panicked"),
        }
    }
    tracing::debug!("file context stopped");
}

/// The history context
///
/// Store failures are logged and otherwise swallowed; requests that someone
/// waits on are still answered (with nothing).
pub(super) async fn run_history_context(
    mut requests: mpsc::UnboundedReceiver<HistoryRequest>,
    history: Arc<dyn HistoryStore>,
    inbox: Inbox,
) {
    while let Some(request) = requests.recv().await {
        match request {
            HistoryRequest::CleanUpInProgress => {
                if let Err(e) = history.clean_up_in_progress_entries().await {
                    tracing::error!(error = %e, "failed to clean up interrupted downloads");
                }
            }
            HistoryRequest::Query => {
                let records = history.query_downloads().await.unwrap_or_else(|e| {
                    tracing::error!(error = %e, "failed to load download history");
                    Vec::new()
                });
                answer(&inbox, ManagerMessage::QueryComplete(records));
            }
            HistoryRequest::Create(info) => {
                match history.create_download(&DownloadRecord::from(info.as_ref())).await {
                    Ok(handle) => answer(&inbox, ManagerMessage::CreateComplete { info, handle }),
                    Err(e) => tracing::error!(
                        download_id = info.download_id.0,
                        error = %e,
                        "failed to create history record"
                    ),
                }
            }
            HistoryRequest::Update {
                handle,
                received_bytes,
                state,
            } => {
                if let Err(e) = history.update_download(handle, received_bytes, state).await {
                    tracing::warn!(handle = handle.0, error = %e, "failed to update history record");
                }
            }
            HistoryRequest::UpdatePath { handle, path } => {
                if let Err(e) = history.update_download_path(handle, &path).await {
                    tracing::warn!(handle = handle.0, error = %e, "failed to update history path");
                }
            }
            HistoryRequest::Remove(handle) => {
                if let Err(e) = history.remove_download(handle).await {
                    tracing::warn!(handle = handle.0, error = %e, "failed to remove history record");
                }
            }
            HistoryRequest::RemoveBetween { begin, end } => {
                if let Err(e) = history.remove_downloads_between(begin, end).await {
                    tracing::warn!(error = %e, "failed to remove history range");
                }
            }
            HistoryRequest::Search { request, text } => {
                let handles = history.search_downloads(&text).await.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "history search failed");
                    Vec::new()
                });
                answer(&inbox, ManagerMessage::SearchComplete { request, handles });
            }
            HistoryRequest::LoadAutoOpen => {
                let extensions = history.load_auto_open().await.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "failed to load auto-open extensions");
                    None
                });
                answer(&inbox, ManagerMessage::AutoOpenLoaded(extensions));
            }
            HistoryRequest::SaveAutoOpen(extensions) => {
                if let Err(e) = history.save_auto_open(&extensions).await {
                    tracing::warn!(error = %e, "failed to save auto-open extensions");
                }
            }
        }
    }
    tracing::debug!("history context stopped");
}

/// The network context
pub(super) async fn run_network_context(
    mut commands: mpsc::UnboundedReceiver<NetworkCommand>,
    requests: Arc<dyn RequestController>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            NetworkCommand::Cancel(owner) => requests.cancel_request(owner),
            NetworkCommand::Pause { owner, pause } => requests.pause_request(owner, pause),
        }
    }
    tracing::debug!("network context stopped");
}

/// The dialog context: one prompt at a time
///
/// A prompt still open at shutdown is abandoned.
pub(super) async fn run_dialog_context(
    mut prompts: mpsc::UnboundedReceiver<DialogRequest>,
    dialog: Arc<dyn SaveAsDialog>,
    inbox: Inbox,
    cancel: CancellationToken,
) {
    while let Some(prompt) = prompts.recv().await {
        let DialogRequest {
            token,
            suggested_path,
            owner,
        } = prompt;

        let chosen = tokio::select! {
            chosen = dialog.select_file(&suggested_path, owner) => chosen,
            _ = cancel.cancelled() => break,
        };

        let message = match chosen {
            Some(path) => ManagerMessage::FileSelected { token, path },
            None => ManagerMessage::FileSelectionCanceled { token },
        };
        answer(&inbox, message);
    }
    tracing::debug!("dialog context stopped");
}
