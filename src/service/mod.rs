//! Runtime wiring: the manager plus its execution contexts as tokio tasks
//!
//! [`DownloadService`] spawns one task per context (UI, file I/O, history,
//! network, dialog) and exposes the manager's operations as async methods.
//! The transfer engine reports through [`DownloadService::start_download`],
//! [`DownloadService::update_download`] and
//! [`DownloadService::download_finished`]; everything else is the user side.

mod workers;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::collaborators::{Collaborators, HistoryStore, NoOpHistoryStore};
use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::manager::{Contexts, DownloadManager, ManagerMessage, Reply, ShutdownReport};
use crate::safety::SafetyPolicy;
use crate::types::{DownloadCreateInfo, DownloadId, DownloadSnapshot, Event, ItemKey};

use workers::FileContext;

/// Handle to a running download manager (cloneable, all fields are shared)
#[derive(Clone)]
pub struct DownloadService {
    inbox: mpsc::UnboundedSender<ManagerMessage>,
    event_tx: broadcast::Sender<Event>,
    cancel: CancellationToken,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    db: Option<Arc<Database>>,
}

impl DownloadService {
    /// Start a service backed by the SQLite history at
    /// `config.persistence.database_path`
    ///
    /// Off-the-record sessions never open the database.
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;

        if config.download.off_the_record {
            let history: Arc<dyn HistoryStore> = Arc::new(NoOpHistoryStore::default());
            return Self::with_collaborators(config, Collaborators::local(history));
        }

        let db = Arc::new(Database::new(&config.persistence.database_path).await?);
        let history: Arc<dyn HistoryStore> = db.clone();
        let mut service = Self::with_collaborators(config, Collaborators::local(history))?;
        service.db = Some(db);
        Ok(service)
    }

    /// Start a service with explicit collaborators
    ///
    /// Must be called inside a tokio runtime.
    pub fn with_collaborators(config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(1000);
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (contexts, receivers) = Contexts::channel();
        let cancel = CancellationToken::new();

        let mut manager = DownloadManager::new(
            &config,
            contexts,
            collaborators.pages.clone(),
            event_tx.clone(),
        );
        manager.init();

        let file_context = FileContext {
            engine: collaborators.file_engine.clone(),
            shell: collaborators.shell.clone(),
            documents_dir: config.download.documents_dir.clone(),
            policy: SafetyPolicy::new(&config.safety),
        };

        let tasks = vec![
            tokio::spawn(workers::run_ui_context(
                manager,
                inbox_rx,
                config.download.progress_update_interval,
                cancel.clone(),
            )),
            tokio::spawn(workers::run_file_context(
                receivers.file,
                file_context,
                inbox_tx.clone(),
            )),
            tokio::spawn(workers::run_history_context(
                receivers.history,
                collaborators.history.clone(),
                inbox_tx.clone(),
            )),
            tokio::spawn(workers::run_network_context(
                receivers.network,
                collaborators.requests.clone(),
            )),
            tokio::spawn(workers::run_dialog_context(
                receivers.dialog,
                collaborators.dialog.clone(),
                inbox_tx.clone(),
                cancel.clone(),
            )),
        ];

        tracing::info!(
            download_dir = %config.download.download_dir.display(),
            off_the_record = config.download.off_the_record,
            "download service started"
        );

        Ok(Self {
            inbox: inbox_tx,
            event_tx,
            cancel,
            tasks: Arc::new(Mutex::new(tasks)),
            db: None,
        })
    }

    /// Subscribe to item and model events
    ///
    /// Each subscriber receives every event; a subscriber more than 1000
    /// events behind gets `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    fn post(&self, message: ManagerMessage) -> Result<()> {
        self.inbox.send(message).map_err(|_| Error::ShuttingDown)
    }

    async fn request<T>(&self, message: impl FnOnce(Reply<T>) -> ManagerMessage) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.post(message(tx))?;
        rx.await.map_err(|_| Error::ShuttingDown)
    }

    // Transfer engine

    /// A new transfer began
    pub fn start_download(&self, info: DownloadCreateInfo) -> Result<()> {
        self.post(ManagerMessage::StartDownload(Box::new(info)))
    }

    /// Bytes arrived for a transfer
    pub fn update_download(&self, id: DownloadId, bytes_so_far: u64) -> Result<()> {
        self.post(ManagerMessage::UpdateDownload { id, bytes_so_far })
    }

    /// A transfer wrote its last byte
    pub fn download_finished(&self, id: DownloadId, size: u64) -> Result<()> {
        self.post(ManagerMessage::DownloadFinished { id, size })
    }

    // User commands

    /// Cancel an active download (no-op once it finished)
    pub async fn cancel_download(&self, key: ItemKey) -> Result<()> {
        self.request(|reply| ManagerMessage::Cancel(key, reply))
            .await?
    }

    /// Pause or resume an active download; returns the new paused state
    pub async fn toggle_pause(&self, key: ItemKey) -> Result<bool> {
        self.request(|reply| ManagerMessage::TogglePause(key, reply))
            .await?
    }

    /// Remove a download from the list, optionally deleting its file
    pub async fn remove_download(&self, key: ItemKey, delete_file: bool) -> Result<()> {
        self.request(|reply| ManagerMessage::Remove {
            key,
            delete_file,
            reply,
        })
        .await?
    }

    /// Approve a dangerous download
    pub async fn validate_dangerous_download(&self, key: ItemKey) -> Result<()> {
        self.request(|reply| ManagerMessage::Validate(key, reply))
            .await?
    }

    /// Reject a dangerous download and delete its file
    pub async fn discard_dangerous_download(&self, key: ItemKey) -> Result<()> {
        self.request(|reply| ManagerMessage::Discard(key, reply))
            .await?
    }

    /// Open the download with its default application once it finishes
    pub async fn set_open_when_complete(&self, key: ItemKey, open: bool) -> Result<()> {
        self.request(|reply| ManagerMessage::SetOpenWhenComplete { key, open, reply })
            .await?
    }

    /// Open a finished download
    pub async fn open_download(&self, key: ItemKey) -> Result<()> {
        self.request(|reply| ManagerMessage::Open(key, reply))
            .await?
    }

    /// Reveal a download in the system file browser
    pub async fn show_download_in_folder(&self, key: ItemKey) -> Result<()> {
        self.request(|reply| ManagerMessage::ShowInFolder(key, reply))
            .await?
    }

    /// Register or unregister an extension for automatic opening
    pub async fn open_files_of_extension(&self, extension: &str, open: bool) -> Result<bool> {
        let extension = extension.to_string();
        self.request(|reply| ManagerMessage::OpenFilesOfExtension {
            extension,
            open,
            reply,
        })
        .await?
    }

    /// Forget every auto-open registration
    pub async fn reset_auto_open_files(&self) -> Result<()> {
        self.request(ManagerMessage::ResetAutoOpenFiles).await
    }

    /// Forget the last save-as directory
    pub async fn clear_last_download_path(&self) -> Result<()> {
        self.request(ManagerMessage::ClearLastDownloadPath).await
    }

    // Queries

    /// Every persisted download, newest first
    pub async fn downloads(&self) -> Result<Vec<DownloadSnapshot>> {
        self.request(ManagerMessage::Downloads).await
    }

    /// Persisted downloads whose URL or path contains `text`
    pub async fn search_downloads(&self, text: &str) -> Result<Vec<DownloadSnapshot>> {
        let text = text.to_string();
        self.request(|reply| ManagerMessage::Search { text, reply })
            .await
    }

    /// Number of transfers not yet finished or not yet persisted
    pub async fn in_progress_count(&self) -> Result<usize> {
        self.request(ManagerMessage::InProgressCount).await
    }

    /// Remove finished downloads started in `[begin, end)`
    pub async fn remove_downloads_between(
        &self,
        begin: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<usize> {
        self.request(|reply| ManagerMessage::RemoveBetween { begin, end, reply })
            .await
    }

    /// Remove finished downloads started at or after `begin`
    pub async fn remove_downloads(&self, begin: DateTime<Utc>) -> Result<usize> {
        self.remove_downloads_between(begin, None).await
    }

    /// Remove every finished download
    pub async fn remove_all_downloads(&self) -> Result<usize> {
        self.remove_downloads_between(DateTime::<Utc>::UNIX_EPOCH, None)
            .await
    }

    /// Stop the manager and wait for every context to drain
    ///
    /// Work already posted (history writes, file deletions) completes before
    /// this returns. Further calls on any clone fail with
    /// [`Error::ShuttingDown`].
    pub async fn shutdown(&self) -> Result<ShutdownReport> {
        tracing::info!("initiating download service shutdown");
        let report = self.request(ManagerMessage::Shutdown).await?;

        // Abandons a save-as prompt that may never be answered
        self.cancel.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "context task failed");
            }
        }

        if let Some(db) = &self.db {
            db.pool().close().await;
        }

        tracing::info!("download service shut down");
        Ok(report)
    }
}
