//! Messages exchanged between the UI context and the other execution contexts
//!
//! Every payload is owned; nothing refers back into another context's state.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

use crate::error::Result;
use crate::types::{
    DbHandle, DownloadCreateInfo, DownloadId, DownloadRecord, DownloadSnapshot, DownloadState,
    ItemKey, RequestOwner,
};
use crate::utils::DangerousRename;

use super::ShutdownReport;

/// Work for the file-I/O context, processed in FIFO order
#[derive(Debug)]
pub enum FileTask {
    /// Create the download directory
    CreateDirectory(PathBuf),
    /// Probe the suggested path, then answer with
    /// [`ManagerMessage::PathExistenceAvailable`]
    CheckSuggestedPath(Box<DownloadCreateInfo>),
    /// Tell the engine the final target of a transfer
    FinalDownloadName {
        /// Transfer
        id: DownloadId,
        /// Final path
        path: PathBuf,
    },
    /// Drop partial-transfer bookkeeping
    CancelDownload(DownloadId),
    /// Forget a transfer
    RemoveDownload(DownloadId),
    /// Delete a file
    DeleteFile(PathBuf),
    /// Move an approved dangerous download to its true name, then answer
    /// with [`ManagerMessage::DangerousDownloadRenamed`]
    ProceedWithFinishedDangerous {
        /// Download being renamed
        db_handle: DbHandle,
        /// Current (temporary) path
        path: PathBuf,
        /// True file name
        original_name: PathBuf,
    },
    /// Open a file in the shell
    Open(PathBuf),
    /// Reveal a file in the file browser
    ShowInFolder(PathBuf),
}

/// Work for the history context, processed in FIFO order
#[derive(Debug)]
pub enum HistoryRequest {
    /// Coerce rows left in progress by a previous process to cancelled
    CleanUpInProgress,
    /// Load every record, answered with [`ManagerMessage::QueryComplete`]
    Query,
    /// Store a new record, answered with [`ManagerMessage::CreateComplete`]
    Create(Box<DownloadCreateInfo>),
    /// Sync progress and state
    Update {
        /// Record
        handle: DbHandle,
        /// Bytes received
        received_bytes: u64,
        /// Lifecycle state
        state: DownloadState,
    },
    /// Sync the on-disk path
    UpdatePath {
        /// Record
        handle: DbHandle,
        /// New path
        path: PathBuf,
    },
    /// Delete one record
    Remove(DbHandle),
    /// Delete finished records in a time range
    RemoveBetween {
        /// Inclusive start
        begin: DateTime<Utc>,
        /// Exclusive end, `None` for open-ended
        end: Option<DateTime<Utc>>,
    },
    /// Full-text search, answered with [`ManagerMessage::SearchComplete`]
    Search {
        /// Correlates the answer with the waiting caller
        request: u64,
        /// Text to look for
        text: String,
    },
    /// Load the auto-open set, answered with [`ManagerMessage::AutoOpenLoaded`]
    LoadAutoOpen,
    /// Persist the auto-open set
    SaveAutoOpen(Vec<String>),
}

/// Work for the network context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkCommand {
    /// Abort the request
    Cancel(RequestOwner),
    /// Stop or resume reading
    Pause {
        /// Request
        owner: RequestOwner,
        /// New paused state
        pause: bool,
    },
}

/// A save-as prompt to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogRequest {
    /// Correlates the answer with the waiting download
    pub token: u64,
    /// Path proposed to the user
    pub suggested_path: PathBuf,
    /// Request that produced the download
    pub owner: RequestOwner,
}

/// Reply channel for a request sent to the UI context
pub type Reply<T> = oneshot::Sender<T>;

/// Everything the UI context reacts to
#[derive(Debug)]
pub enum ManagerMessage {
    // Transfer engine
    /// A new transfer began
    StartDownload(Box<DownloadCreateInfo>),
    /// Bytes arrived
    UpdateDownload {
        /// Transfer
        id: DownloadId,
        /// Total received so far
        bytes_so_far: u64,
    },
    /// Bytes stopped arriving
    DownloadFinished {
        /// Transfer
        id: DownloadId,
        /// Final size
        size: u64,
    },

    // File-I/O context
    /// Path probing finished
    PathExistenceAvailable(Box<DownloadCreateInfo>),
    /// An approved dangerous download was moved
    DangerousDownloadRenamed(DangerousRename),

    // History context
    /// Stored records loaded
    QueryComplete(Vec<DownloadRecord>),
    /// A record was created
    CreateComplete {
        /// What was stored
        info: Box<DownloadCreateInfo>,
        /// Handle assigned by the store
        handle: DbHandle,
    },
    /// A search finished
    SearchComplete {
        /// Request being answered
        request: u64,
        /// Matching handles
        handles: Vec<DbHandle>,
    },
    /// Stored auto-open set loaded
    AutoOpenLoaded(Option<Vec<String>>),

    // Dialog context
    /// The user picked a path
    FileSelected {
        /// Prompt being answered
        token: u64,
        /// Chosen path
        path: PathBuf,
    },
    /// The user dismissed the prompt
    FileSelectionCanceled {
        /// Prompt being answered
        token: u64,
    },

    // User commands
    /// Cancel a download
    Cancel(ItemKey, Reply<Result<()>>),
    /// Pause or resume a download
    TogglePause(ItemKey, Reply<Result<bool>>),
    /// Remove a download from the list, optionally deleting its file
    Remove {
        /// Item
        key: ItemKey,
        /// Delete the file too
        delete_file: bool,
        /// Answer
        reply: Reply<Result<()>>,
    },
    /// Approve a dangerous download
    Validate(ItemKey, Reply<Result<()>>),
    /// Reject a dangerous download
    Discard(ItemKey, Reply<Result<()>>),
    /// Set the open-on-complete flag
    SetOpenWhenComplete {
        /// Item
        key: ItemKey,
        /// New flag
        open: bool,
        /// Answer
        reply: Reply<Result<()>>,
    },
    /// Open a finished download
    Open(ItemKey, Reply<Result<()>>),
    /// Reveal a download in the file browser
    ShowInFolder(ItemKey, Reply<Result<()>>),
    /// Register or unregister an extension for automatic opening
    OpenFilesOfExtension {
        /// Extension
        extension: String,
        /// Register (true) or unregister (false)
        open: bool,
        /// Answer: whether the set changed
        reply: Reply<Result<bool>>,
    },
    /// Forget every auto-open registration
    ResetAutoOpenFiles(Reply<()>),
    /// Forget the last save-as directory
    ClearLastDownloadPath(Reply<()>),

    // Queries
    /// All known downloads, newest first
    Downloads(Reply<Vec<DownloadSnapshot>>),
    /// Downloads matching a text
    Search {
        /// Text to look for (empty = everything)
        text: String,
        /// Answer
        reply: Reply<Vec<DownloadSnapshot>>,
    },
    /// Number of active transfers
    InProgressCount(Reply<usize>),
    /// Remove finished downloads started in a time range
    RemoveBetween {
        /// Inclusive start
        begin: DateTime<Utc>,
        /// Exclusive end, `None` for open-ended
        end: Option<DateTime<Utc>>,
        /// Answer: number of items removed
        reply: Reply<usize>,
    },

    /// Stop the manager
    Shutdown(Reply<ShutdownReport>),
}

/// Senders into the execution contexts the manager posts work to
#[derive(Clone, Debug)]
pub struct Contexts {
    /// File-I/O context
    pub file: mpsc::UnboundedSender<FileTask>,
    /// History context
    pub history: mpsc::UnboundedSender<HistoryRequest>,
    /// Network context
    pub network: mpsc::UnboundedSender<NetworkCommand>,
    /// Dialog context
    pub dialog: mpsc::UnboundedSender<DialogRequest>,
}

/// Receiving ends matching a [`Contexts`]
#[derive(Debug)]
pub struct ContextReceivers {
    /// File-I/O context
    pub file: mpsc::UnboundedReceiver<FileTask>,
    /// History context
    pub history: mpsc::UnboundedReceiver<HistoryRequest>,
    /// Network context
    pub network: mpsc::UnboundedReceiver<NetworkCommand>,
    /// Dialog context
    pub dialog: mpsc::UnboundedReceiver<DialogRequest>,
}

impl Contexts {
    /// Fresh set of unbounded channels
    pub fn channel() -> (Self, ContextReceivers) {
        let (file_tx, file_rx) = mpsc::unbounded_channel();
        let (history_tx, history_rx) = mpsc::unbounded_channel();
        let (network_tx, network_rx) = mpsc::unbounded_channel();
        let (dialog_tx, dialog_rx) = mpsc::unbounded_channel();
        (
            Self {
                file: file_tx,
                history: history_tx,
                network: network_tx,
                dialog: dialog_tx,
            },
            ContextReceivers {
                file: file_rx,
                history: history_rx,
                network: network_rx,
                dialog: dialog_rx,
            },
        )
    }

    pub(crate) fn post_file(&self, task: FileTask) {
        if let Err(e) = self.file.send(task) {
            tracing::warn!(task = ?e.0, "file context is gone, dropping task");
        }
    }

    pub(crate) fn post_history(&self, request: HistoryRequest) {
        if let Err(e) = self.history.send(request) {
            tracing::warn!(request = ?e.0, "history context is gone, dropping request");
        }
    }

    pub(crate) fn post_network(&self, command: NetworkCommand) {
        if let Err(e) = self.network.send(command) {
            tracing::warn!(command = ?e.0, "network context is gone, dropping command");
        }
    }

    pub(crate) fn post_dialog(&self, request: DialogRequest) {
        if let Err(e) = self.dialog.send(request) {
            tracing::warn!(token = e.0.token, "dialog context is gone, dropping prompt");
        }
    }
}
