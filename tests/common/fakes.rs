//! Recording stand-ins for the external collaborators

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use browser_dl::collaborators::LocalFileEngine;
use browser_dl::{
    Collaborators, DownloadId, DownloadSnapshot, FileEngine, HistoryStore, PageDelegate,
    RequestController, RequestOwner, SaveAsDialog, Shell,
};

/// Local disk engine that also remembers what it was told
#[derive(Default)]
pub struct RecordingFileEngine {
    pub final_names: Mutex<Vec<(DownloadId, PathBuf)>>,
    pub cancelled: Mutex<Vec<DownloadId>>,
    pub deleted: Mutex<Vec<PathBuf>>,
}

impl FileEngine for RecordingFileEngine {
    fn create_directory(&self, path: &Path) -> std::io::Result<()> {
        LocalFileEngine.create_directory(path)
    }

    fn on_final_download_name(&self, id: DownloadId, path: &Path) {
        self.final_names
            .lock()
            .unwrap()
            .push((id, path.to_path_buf()));
    }

    fn cancel_download(&self, id: DownloadId) {
        self.cancelled.lock().unwrap().push(id);
    }

    fn delete_file(&self, path: &Path) -> std::io::Result<()> {
        self.deleted.lock().unwrap().push(path.to_path_buf());
        LocalFileEngine.delete_file(path)
    }

    fn remove_download(&self, _id: DownloadId) {}
}

/// Network layer that records cancels and pauses
#[derive(Default)]
pub struct RecordingRequests {
    pub cancelled: Mutex<Vec<RequestOwner>>,
    pub paused: Mutex<Vec<(RequestOwner, bool)>>,
}

impl RequestController for RecordingRequests {
    fn cancel_request(&self, owner: RequestOwner) {
        self.cancelled.lock().unwrap().push(owner);
    }

    fn pause_request(&self, owner: RequestOwner, pause: bool) {
        self.paused.lock().unwrap().push((owner, pause));
    }
}

/// Save-as prompt with a canned answer
#[derive(Default)]
pub struct ScriptedDialog {
    pub answer: Option<PathBuf>,
    pub prompts: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl SaveAsDialog for ScriptedDialog {
    async fn select_file(&self, suggested_path: &Path, _owner: RequestOwner) -> Option<PathBuf> {
        self.prompts
            .lock()
            .unwrap()
            .push(suggested_path.to_path_buf());
        self.answer.clone()
    }
}

/// Shell that records instead of launching anything
#[derive(Default)]
pub struct RecordingShell {
    pub opened: Mutex<Vec<PathBuf>>,
    pub revealed: Mutex<Vec<PathBuf>>,
}

impl Shell for RecordingShell {
    fn open_item(&self, path: &Path) -> std::io::Result<()> {
        self.opened.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    fn show_item_in_folder(&self, path: &Path) -> std::io::Result<()> {
        self.revealed.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

/// Pages that count where new downloads were shown
#[derive(Default)]
pub struct RecordingPages {
    pub page_active: bool,
    pub shown_in_page: AtomicUsize,
    pub shown_in_window: AtomicUsize,
}

impl PageDelegate for RecordingPages {
    fn originating_page_active(&self, _owner: RequestOwner) -> bool {
        self.page_active
    }

    fn show_in_page(&self, _owner: RequestOwner, _download: &DownloadSnapshot) {
        self.shown_in_page.fetch_add(1, Ordering::SeqCst);
    }

    fn show_in_last_active_window(&self, _download: &DownloadSnapshot) -> bool {
        self.shown_in_window.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// Every fake, shared with the running service
#[derive(Clone, Default)]
pub struct Fakes {
    pub files: Arc<RecordingFileEngine>,
    pub requests: Arc<RecordingRequests>,
    pub dialog: Arc<ScriptedDialog>,
    pub shell: Arc<RecordingShell>,
    pub pages: Arc<RecordingPages>,
}

impl Fakes {
    /// Fakes whose save-as prompt answers with `answer`
    pub fn with_dialog_answer(answer: Option<PathBuf>) -> Self {
        Self {
            dialog: Arc::new(ScriptedDialog {
                answer,
                prompts: Mutex::new(Vec::new()),
            }),
            ..Self::default()
        }
    }

    pub fn collaborators(&self, history: Arc<dyn HistoryStore>) -> Collaborators {
        Collaborators {
            file_engine: self.files.clone(),
            history,
            requests: self.requests.clone(),
            dialog: self.dialog.clone(),
            pages: self.pages.clone(),
            shell: self.shell.clone(),
        }
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.shell.opened.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<PathBuf> {
        self.files.deleted.lock().unwrap().clone()
    }

    pub fn network_cancels(&self) -> usize {
        self.requests.cancelled.lock().unwrap().len()
    }
}
