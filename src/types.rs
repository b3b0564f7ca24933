//! Core types for browser-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Transient per-process identifier assigned by the transfer engine
///
/// Only meaningful while the process that started the transfer is alive.
/// Items reconstituted from history carry [`DownloadId::UNASSIGNED`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadId(pub i32);

impl DownloadId {
    /// Id carried by items that were loaded from the history store
    pub const UNASSIGNED: DownloadId = DownloadId(-1);

    /// Create a new DownloadId
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    /// Get the inner value
    pub fn get(&self) -> i32 {
        self.0
    }
}

impl From<i32> for DownloadId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for DownloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Durable handle assigned by the history store
///
/// `0` means the record has not been written yet. Negative values are
/// synthetic handles handed out for off-the-record downloads; they never reach
/// the store and never collide with real (positive) handles.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DbHandle(pub i64);

impl DbHandle {
    /// Handle of a download that has not been persisted yet
    pub const UNINITIALIZED: DbHandle = DbHandle(0);

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }

    /// Whether any handle (real or synthetic) has been assigned
    pub fn is_assigned(&self) -> bool {
        self.0 != 0
    }

    /// Whether this handle refers to a row in the history store
    pub fn is_persistent(&self) -> bool {
        self.0 > 0
    }

    /// Whether this is an off-the-record placeholder handle
    pub fn is_synthetic(&self) -> bool {
        self.0 < 0
    }
}

impl From<i64> for DbHandle {
    fn from(handle: i64) -> Self {
        Self(handle)
    }
}

impl From<DbHandle> for i64 {
    fn from(handle: DbHandle) -> Self {
        handle.0
    }
}

impl std::fmt::Display for DbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// sqlx Type, Encode, and Decode so handles bind directly in queries
impl sqlx::Type<sqlx::Sqlite> for DbHandle {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for DbHandle {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for DbHandle {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let handle = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(handle))
    }
}

/// Stable key of an item inside one manager instance
///
/// Unlike [`DownloadId`] (engine-assigned, absent for restored items) and
/// [`DbHandle`] (assigned late, possibly never), every live item has a key
/// from the moment it is created until it is destroyed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(pub u64);

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a download
///
/// `InProgress → {Cancelled, Complete} → Removing`. Nothing leaves `Removing`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    /// Bytes are still arriving
    InProgress,
    /// Stopped by the user or by shutdown
    Cancelled,
    /// All bytes written
    Complete,
    /// Being deleted from the manager (terminal)
    Removing,
}

impl DownloadState {
    /// Convert the stored integer code to a state
    pub fn from_i32(state: i32) -> Self {
        match state {
            0 => DownloadState::InProgress,
            1 => DownloadState::Complete,
            2 => DownloadState::Cancelled,
            3 => DownloadState::Removing,
            _ => DownloadState::Cancelled, // Unknown rows are treated as dead
        }
    }

    /// Convert the state to its stored integer code
    pub fn to_i32(&self) -> i32 {
        match self {
            DownloadState::InProgress => 0,
            DownloadState::Complete => 1,
            DownloadState::Cancelled => 2,
            DownloadState::Removing => 3,
        }
    }

    /// Whether the download has stopped receiving bytes for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadState::Cancelled | DownloadState::Complete)
    }
}

/// Safety classification of a download
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyState {
    /// Nothing suspicious about the file name
    #[default]
    Safe,
    /// Executable-class file waiting for the user's approval
    Dangerous,
    /// Executable-class file the user explicitly approved
    DangerousButValidated,
}

/// Identifies the network request (and page) that produced a download
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestOwner {
    /// Renderer process that issued the request
    pub process_id: i32,
    /// Page (view) inside that process
    pub route_id: i32,
    /// Request id inside that process
    pub request_id: i32,
}

/// Everything known about a download before its item exists
///
/// Produced by the transfer engine, enriched by path resolution on the UI and
/// file contexts, and finally used to construct a [`crate::DownloadItem`]. It
/// always travels between contexts by value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadCreateInfo {
    /// Engine-assigned transient id
    pub download_id: DownloadId,
    /// Source URL
    pub url: String,
    /// Raw Content-Disposition header, if the server sent one
    pub content_disposition: Option<String>,
    /// Server-declared MIME type
    pub mime_type: String,
    /// Request that produced the download
    pub owner: RequestOwner,
    /// Advertised size (0 = unknown)
    pub total_bytes: u64,
    /// Bytes received so far
    pub received_bytes: u64,
    /// Wall-clock start time
    pub start_time: DateTime<Utc>,
    /// Whether the user must pick the location
    pub save_as: bool,
    /// Path proposed by name generation and probing
    pub suggested_path: PathBuf,
    /// Final on-disk target (set when the item is created)
    pub path: PathBuf,
    /// True name of a dangerous download hidden behind a temporary name
    pub original_name: PathBuf,
    /// "(n)" suffix chosen for the true name (0 = none)
    pub path_uniquifier: u32,
    /// Executable-class file name
    pub is_dangerous: bool,
    /// Lifecycle state
    pub state: DownloadState,
    /// Durable handle
    pub db_handle: DbHandle,
}

impl DownloadCreateInfo {
    /// Describe a freshly started transfer
    pub fn new(download_id: DownloadId, url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            download_id,
            url: url.into(),
            content_disposition: None,
            mime_type: mime_type.into(),
            owner: RequestOwner::default(),
            total_bytes: 0,
            received_bytes: 0,
            start_time: Utc::now(),
            save_as: false,
            suggested_path: PathBuf::new(),
            path: PathBuf::new(),
            original_name: PathBuf::new(),
            path_uniquifier: 0,
            is_dangerous: false,
            state: DownloadState::InProgress,
            db_handle: DbHandle::UNINITIALIZED,
        }
    }
}

/// A download as stored by the history store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// Durable handle (unassigned when the record is about to be created)
    pub db_handle: DbHandle,
    /// Source URL
    pub url: String,
    /// On-disk path
    pub full_path: PathBuf,
    /// Wall-clock start time
    pub start_time: DateTime<Utc>,
    /// Bytes received
    pub received_bytes: u64,
    /// Advertised size (0 = unknown)
    pub total_bytes: u64,
    /// Lifecycle state
    pub state: DownloadState,
}

impl From<&DownloadCreateInfo> for DownloadRecord {
    fn from(info: &DownloadCreateInfo) -> Self {
        Self {
            db_handle: info.db_handle,
            url: info.url.clone(),
            full_path: info.path.clone(),
            start_time: info.start_time,
            received_bytes: info.received_bytes,
            total_bytes: info.total_bytes,
            state: info.state,
        }
    }
}

/// Immutable view of an item handed to observers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadSnapshot {
    /// Manager-local key (use it for user commands)
    pub key: ItemKey,
    /// Engine id
    pub id: DownloadId,
    /// Durable handle
    pub db_handle: DbHandle,
    /// Source URL
    pub url: String,
    /// On-disk path (temporary name for unapproved dangerous downloads)
    pub full_path: PathBuf,
    /// Name to show the user
    pub display_name: PathBuf,
    /// Bytes received
    pub received_bytes: u64,
    /// Advertised size (0 = unknown)
    pub total_bytes: u64,
    /// Percent complete, `None` while the size is unknown
    pub percent_complete: Option<u32>,
    /// Average speed since start in bytes per second
    pub speed_bps: u64,
    /// Estimated time remaining, `None` when it cannot be estimated
    pub time_remaining: Option<Duration>,
    /// Lifecycle state
    pub state: DownloadState,
    /// Safety classification
    pub safety_state: SafetyState,
    /// Paused by the user
    pub is_paused: bool,
    /// Open in the shell once finished
    pub open_when_complete: bool,
    /// Wall-clock start time
    pub start_time: DateTime<Utc>,
}

/// Event broadcast to observers
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An item changed (bytes, state, name, safety, pause) or the refresh timer fired
    DownloadUpdated(DownloadSnapshot),

    /// A download finished and its completion became durable (sent once per download)
    DownloadCompleted {
        /// Item key
        key: ItemKey,
        /// Durable (or synthetic) handle
        db_handle: DbHandle,
        /// On-disk path at completion time
        path: PathBuf,
    },

    /// The set of known downloads changed
    ModelChanged,

    /// The manager shut down
    Shutdown,
}
