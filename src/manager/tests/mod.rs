use super::*;
use crate::collaborators::NoOpPageDelegate;
use crate::types::{DownloadId, DownloadRecord, DownloadState, SafetyState};
use chrono::{TimeZone, Utc};
use std::path::Path;


/// Manager wired to bare channels so every posted task can be inspected
struct Harness {
    manager: DownloadManager,
    rx: ContextReceivers,
    events: broadcast::Receiver<Event>,
}

fn config() -> Config {
    let mut config = Config::default();
    config.download.download_dir = PathBuf::from("/downloads");
    config.download.documents_dir = PathBuf::from("/documents");
    config
}

fn harness() -> Harness {
    harness_with(config())
}

fn harness_with(config: Config) -> Harness {
    let (contexts, rx) = Contexts::channel();
    let (events_tx, events) = broadcast::channel(1024);
    let manager = DownloadManager::new(&config, contexts, Arc::new(NoOpPageDelegate), events_tx);
    Harness {
        manager,
        rx,
        events,
    }
}

fn info(id: i32, path: &str) -> DownloadCreateInfo {
    let mut info = DownloadCreateInfo::new(DownloadId(id), format!("http://host/{id}"), "text/plain");
    info.path = PathBuf::from(path);
    info.total_bytes = 1024;
    info
}

/// Info for an executable hidden behind a temporary name
fn dangerous_info(id: i32) -> DownloadCreateInfo {
    let mut info = DownloadCreateInfo::new(DownloadId(id), "http://host/a.exe", "application/octet-stream");
    info.path = PathBuf::from("/downloads/unconfirmed 4242.download");
    info.original_name = PathBuf::from("a.exe");
    info.is_dangerous = true;
    info
}

fn restored(handle: i64, start_secs: i64, state: DownloadState) -> DownloadRecord {
    DownloadRecord {
        db_handle: DbHandle(handle),
        url: format!("http://host/r{handle}"),
        full_path: PathBuf::from(format!("/downloads/r{handle}")),
        start_time: Utc.timestamp_opt(start_secs, 0).unwrap(),
        received_bytes: 10,
        total_bytes: 10,
        state,
    }
}

impl Harness {
    /// Announce the transfer the way the engine does, dropping the path check
    fn announce(&mut self, info: &DownloadCreateInfo) {
        self.manager.start_download(info.clone());
        self.file_tasks();
    }

    /// Create the item directly, skipping path resolution
    fn begin(&mut self, info: DownloadCreateInfo) -> ItemKey {
        let id = info.download_id;
        let path = info.path.clone();
        self.manager.continue_start_download(info, path);
        self.manager.index.in_progress_key(id).expect("item not created")
    }

    /// Answer the pending history create for `id` with `handle`
    fn persist(&mut self, id: i32, handle: i64) {
        let mut info = None;
        for request in self.history() {
            if let HistoryRequest::Create(created) = request
                && created.download_id == DownloadId(id)
            {
                info = Some(created);
            }
        }
        let info = info.expect("no create request posted");
        self.manager
            .on_create_download_entry_complete(*info, DbHandle(handle));
    }

    fn begin_persisted(&mut self, info: DownloadCreateInfo, handle: i64) -> ItemKey {
        let id = info.download_id.0;
        let key = self.begin(info);
        self.persist(id, handle);
        key
    }

    fn item(&self, key: ItemKey) -> &DownloadItem {
        self.manager.index.get(key).expect("item gone")
    }

    fn file_tasks(&mut self) -> Vec<FileTask> {
        std::iter::from_fn(|| self.rx.file.try_recv().ok()).collect()
    }

    fn history(&mut self) -> Vec<HistoryRequest> {
        std::iter::from_fn(|| self.rx.history.try_recv().ok()).collect()
    }

    fn network(&mut self) -> Vec<NetworkCommand> {
        std::iter::from_fn(|| self.rx.network.try_recv().ok()).collect()
    }

    fn dialogs(&mut self) -> Vec<DialogRequest> {
        std::iter::from_fn(|| self.rx.dialog.try_recv().ok()).collect()
    }

    fn events(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.events.try_recv().ok()).collect()
    }

    /// Throw away everything posted so far
    fn drain(&mut self) {
        self.file_tasks();
        self.history();
        self.network();
        self.dialogs();
        self.events();
    }
}

fn updates(requests: &[HistoryRequest]) -> Vec<(DbHandle, u64, DownloadState)> {
    requests
        .iter()
        .filter_map(|request| match request {
            HistoryRequest::Update {
                handle,
                received_bytes,
                state,
            } => Some((*handle, *received_bytes, *state)),
            _ => None,
        })
        .collect()
}

fn completed_count(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, Event::DownloadCompleted { .. }))
        .count()
}

fn model_changed_count(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, Event::ModelChanged))
        .count()
}

fn opened(tasks: &[FileTask]) -> Vec<&Path> {
    tasks
        .iter()
        .filter_map(|task| match task {
            FileTask::Open(path) => Some(path.as_path()),
            _ => None,
        })
        .collect()
}
