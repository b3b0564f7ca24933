use super::*;
use crate::types::{DbHandle, DownloadRecord, DownloadState};
use chrono::{Duration, TimeZone, Utc};
use std::path::PathBuf;

mod close;
mod migrations;

/// Record started at `start_secs` (Unix time) in the given state
fn record(url: &str, start_secs: i64, state: DownloadState) -> DownloadRecord {
    DownloadRecord {
        db_handle: DbHandle::UNINITIALIZED,
        url: url.to_string(),
        full_path: PathBuf::from(format!("/downloads/{}", url.rsplit('/').next().unwrap())),
        start_time: Utc.timestamp_opt(start_secs, 0).unwrap(),
        received_bytes: 0,
        total_bytes: 1000,
        state,
    }
}

fn seconds(n: i64) -> Duration {
    Duration::seconds(n)
}
