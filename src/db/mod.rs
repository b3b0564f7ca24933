//! Database layer for browser-dl
//!
//! SQLite persistence for the download history.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`downloads`]: Download history CRUD and search
//! - [`state`]: Runtime key/value state (auto-open extensions)
//! - [`history`]: [`HistoryStore`](crate::collaborators::HistoryStore) implementation

use chrono::{DateTime, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::path::PathBuf;

use crate::types::{DbHandle, DownloadRecord, DownloadState};

mod downloads;
mod history;
mod migrations;
mod state;

/// Download row as stored in the `downloads` table
#[derive(Debug, Clone, FromRow)]
pub struct DownloadRow {
    /// Durable handle
    pub id: i64,
    /// On-disk path
    pub full_path: String,
    /// Source URL
    pub url: String,
    /// Start time (Unix microseconds)
    pub start_time: i64,
    /// Bytes received
    pub received_bytes: i64,
    /// Advertised size (0 = unknown)
    pub total_bytes: i64,
    /// State code (0=in progress, 1=complete, 2=cancelled, 3=removing)
    pub state: i32,
}

impl From<DownloadRow> for DownloadRecord {
    fn from(row: DownloadRow) -> Self {
        Self {
            db_handle: DbHandle(row.id),
            url: row.url,
            full_path: PathBuf::from(row.full_path),
            start_time: micros_to_datetime(row.start_time),
            received_bytes: row.received_bytes.max(0) as u64,
            total_bytes: row.total_bytes.max(0) as u64,
            state: DownloadState::from_i32(row.state),
        }
    }
}

pub(crate) fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Database handle for browser-dl
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
