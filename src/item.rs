//! A single download: state machine, metrics and change notification

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::types::{
    DbHandle, DownloadCreateInfo, DownloadId, DownloadRecord, DownloadSnapshot, DownloadState,
    Event, ItemKey, RequestOwner, SafetyState,
};
use crate::utils::append_number_to_path;

/// One in-flight or finished download
///
/// Owned by the manager's index and only mutated from the UI context. Every
/// visible change is announced as [`Event::DownloadUpdated`].
#[derive(Debug)]
pub struct DownloadItem {
    key: ItemKey,
    id: DownloadId,
    db_handle: DbHandle,
    full_path: PathBuf,
    original_name: PathBuf,
    path_uniquifier: u32,
    url: String,
    total_bytes: u64,
    received_bytes: u64,
    start_time: DateTime<Utc>,
    start_tick: Instant,
    state: DownloadState,
    safety_state: SafetyState,
    is_paused: bool,
    open_when_complete: bool,
    owner: RequestOwner,
    is_otr: bool,
    progress_timer: bool,
    events: broadcast::Sender<Event>,
}

impl DownloadItem {
    /// Item for a transfer that is starting now
    pub fn new(
        key: ItemKey,
        info: &DownloadCreateInfo,
        is_otr: bool,
        events: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            key,
            id: info.download_id,
            db_handle: info.db_handle,
            full_path: info.path.clone(),
            original_name: info.original_name.clone(),
            path_uniquifier: info.path_uniquifier,
            url: info.url.clone(),
            total_bytes: info.total_bytes,
            received_bytes: info.received_bytes,
            start_time: info.start_time,
            start_tick: Instant::now(),
            state: DownloadState::InProgress,
            safety_state: if info.is_dangerous {
                SafetyState::Dangerous
            } else {
                SafetyState::Safe
            },
            is_paused: false,
            open_when_complete: false,
            owner: info.owner,
            is_otr,
            progress_timer: true,
            events,
        }
    }

    /// Item reconstituted from a history record
    ///
    /// The process that was downloading a stale `InProgress` record is gone,
    /// so such records come back as `Cancelled`.
    pub fn from_record(key: ItemKey, record: &DownloadRecord, events: broadcast::Sender<Event>) -> Self {
        let state = match record.state {
            DownloadState::InProgress => DownloadState::Cancelled,
            state => state,
        };
        Self {
            key,
            id: DownloadId::UNASSIGNED,
            db_handle: record.db_handle,
            full_path: record.full_path.clone(),
            original_name: PathBuf::new(),
            path_uniquifier: 0,
            url: record.url.clone(),
            total_bytes: record.total_bytes,
            received_bytes: record.received_bytes,
            start_time: record.start_time,
            start_tick: Instant::now(),
            state,
            safety_state: SafetyState::Safe,
            is_paused: false,
            open_when_complete: false,
            owner: RequestOwner::default(),
            is_otr: false,
            progress_timer: false,
            events,
        }
    }

    /// Record progress reported by the transfer engine
    ///
    /// # Panics
    ///
    /// If the item is no longer in progress.
    pub fn update(&mut self, bytes_so_far: u64) {
        assert_eq!(
            self.state,
            DownloadState::InProgress,
            "update on download {} that is not in progress",
            self.id
        );
        self.update_size(bytes_so_far);
        self.notify();
    }

    /// Stop the download
    ///
    /// Returns `false` (and does nothing) unless the item was in progress; the
    /// caller propagates the cancel to the request when this returns `true`.
    pub fn cancel(&mut self) -> bool {
        if self.state != DownloadState::InProgress {
            return false;
        }
        self.state = DownloadState::Cancelled;
        self.progress_timer = false;
        self.notify();
        true
    }

    /// Mark all bytes written
    pub fn finished(&mut self, size: u64) {
        self.state = DownloadState::Complete;
        if size > 0 {
            self.update_size(size);
        }
        self.progress_timer = false;
        self.notify();
    }

    /// Enter the terminal removal state, cancelling first if still active
    ///
    /// Returns whether a cancel happened.
    pub fn remove(&mut self) -> bool {
        let cancelled = self.cancel();
        self.state = DownloadState::Removing;
        cancelled
    }

    /// Point the item at a new on-disk path
    pub fn rename(&mut self, path: PathBuf) {
        self.full_path = path;
        self.notify();
    }

    /// Flip the paused flag
    ///
    /// # Panics
    ///
    /// If the item is no longer in progress.
    pub fn toggle_pause(&mut self) -> bool {
        assert_eq!(
            self.state,
            DownloadState::InProgress,
            "pause toggled on download {} that is not in progress",
            self.id
        );
        self.is_paused = !self.is_paused;
        self.notify();
        self.is_paused
    }

    /// Periodic refresh so elapsed-time metrics stay current
    pub fn on_progress_tick(&self) {
        if self.progress_timer {
            self.notify();
        }
    }

    fn update_size(&mut self, bytes_so_far: u64) {
        self.received_bytes = bytes_so_far;
        // More bytes than advertised: the size is actually unknown
        if self.received_bytes > self.total_bytes {
            self.total_bytes = 0;
        }
    }

    pub(crate) fn notify(&self) {
        let _ = self.events.send(Event::DownloadUpdated(self.snapshot()));
    }

    /// Average speed since start in bytes per second
    pub fn speed_at(&self, now: Instant) -> u64 {
        let elapsed_ms = now.saturating_duration_since(self.start_tick).as_millis() as u64;
        if elapsed_ms == 0 {
            return 0;
        }
        self.received_bytes.saturating_mul(1000) / elapsed_ms
    }

    /// Average speed since start in bytes per second
    pub fn current_speed(&self) -> u64 {
        self.speed_at(Instant::now())
    }

    /// Remaining time at the average speed, `None` if it cannot be estimated
    pub fn time_remaining_at(&self, now: Instant) -> Option<Duration> {
        if self.total_bytes == 0 {
            return None;
        }
        let speed = self.speed_at(now);
        if speed == 0 {
            return None;
        }
        let remaining = self.total_bytes.saturating_sub(self.received_bytes);
        Some(Duration::from_secs(remaining / speed))
    }

    /// Percent complete, `None` while the size is unknown
    pub fn percent_complete(&self) -> Option<u32> {
        if self.total_bytes == 0 {
            return None;
        }
        Some((self.received_bytes.saturating_mul(100) / self.total_bytes) as u32)
    }

    /// Name shown to the user
    ///
    /// Safe items show their on-disk name. Dangerous ones show the true name
    /// (with its " (n)" suffix), never the temporary one.
    pub fn display_name(&self) -> PathBuf {
        if self.safety_state == SafetyState::Safe {
            return self.file_name();
        }
        if self.path_uniquifier > 0 {
            append_number_to_path(&self.original_name, self.path_uniquifier)
        } else {
            self.original_name.clone()
        }
    }

    /// Current on-disk file name
    pub fn file_name(&self) -> PathBuf {
        self.full_path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_default()
    }

    /// Immutable view for observers
    pub fn snapshot(&self) -> DownloadSnapshot {
        let now = Instant::now();
        DownloadSnapshot {
            key: self.key,
            id: self.id,
            db_handle: self.db_handle,
            url: self.url.clone(),
            full_path: self.full_path.clone(),
            display_name: self.display_name(),
            received_bytes: self.received_bytes,
            total_bytes: self.total_bytes,
            percent_complete: self.percent_complete(),
            speed_bps: self.speed_at(now),
            time_remaining: self.time_remaining_at(now),
            state: self.state,
            safety_state: self.safety_state,
            is_paused: self.is_paused,
            open_when_complete: self.open_when_complete,
            start_time: self.start_time,
        }
    }

    /// Record written to the history store
    pub fn to_record(&self) -> DownloadRecord {
        DownloadRecord {
            db_handle: self.db_handle,
            url: self.url.clone(),
            full_path: self.full_path.clone(),
            start_time: self.start_time,
            received_bytes: self.received_bytes,
            total_bytes: self.total_bytes,
            state: self.state,
        }
    }

    /// Manager-local key
    pub fn key(&self) -> ItemKey {
        self.key
    }

    /// Engine id
    pub fn id(&self) -> DownloadId {
        self.id
    }

    /// Durable handle
    pub fn db_handle(&self) -> DbHandle {
        self.db_handle
    }

    pub(crate) fn set_db_handle(&mut self, handle: DbHandle) {
        self.db_handle = handle;
    }

    /// On-disk path
    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    /// True name of a dangerous download
    pub fn original_name(&self) -> &Path {
        &self.original_name
    }

    pub(crate) fn set_path_uniquifier(&mut self, uniquifier: u32) {
        self.path_uniquifier = uniquifier;
    }

    /// Source URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Bytes received
    pub fn received_bytes(&self) -> u64 {
        self.received_bytes
    }

    /// Advertised size (0 = unknown)
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Wall-clock start time
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Lifecycle state
    pub fn state(&self) -> DownloadState {
        self.state
    }

    /// Safety classification
    pub fn safety_state(&self) -> SafetyState {
        self.safety_state
    }

    pub(crate) fn set_safety_state(&mut self, safety_state: SafetyState) {
        self.safety_state = safety_state;
        self.notify();
    }

    /// Paused by the user
    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    /// Open in the shell once finished
    pub fn open_when_complete(&self) -> bool {
        self.open_when_complete
    }

    pub(crate) fn set_open_when_complete(&mut self, open: bool) {
        self.open_when_complete = open;
        self.notify();
    }

    /// Request that produced the download
    pub fn owner(&self) -> RequestOwner {
        self.owner
    }

    /// Started in an off-the-record session
    pub fn is_otr(&self) -> bool {
        self.is_otr
    }

    /// Whether the refresh timer is running
    pub fn progress_timer_running(&self) -> bool {
        self.progress_timer
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn item_with(total: u64) -> (DownloadItem, broadcast::Receiver<Event>) {
        let (tx, rx) = broadcast::channel(64);
        let mut info = DownloadCreateInfo::new(DownloadId(3), "http://x/file.zip", "application/zip");
        info.total_bytes = total;
        info.path = PathBuf::from("/d/file.zip");
        (DownloadItem::new(ItemKey(1), &info, false, tx), rx)
    }

    fn updated_state(rx: &mut broadcast::Receiver<Event>) -> DownloadState {
        match rx.try_recv().expect("no event") {
            Event::DownloadUpdated(snap) => snap.state,
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_update_tracks_bytes_and_notifies() {
        let (mut item, mut rx) = item_with(1000);
        item.update(250);

        assert_eq!(item.received_bytes(), 250);
        assert_eq!(item.percent_complete(), Some(25));
        assert_eq!(updated_state(&mut rx), DownloadState::InProgress);
    }

    #[test]
    fn test_overrun_resets_total_to_unknown() {
        let (mut item, _rx) = item_with(100);
        item.update(150);

        assert_eq!(item.total_bytes(), 0);
        assert_eq!(item.percent_complete(), None);
        assert_eq!(item.time_remaining_at(Instant::now()), None);
    }

    #[test]
    #[should_panic(expected = "not in progress")]
    fn test_update_after_complete_panics() {
        let (mut item, _rx) = item_with(100);
        item.finished(100);
        item.update(100);
    }

    #[test]
    fn test_cancel_only_from_in_progress() {
        let (mut item, mut rx) = item_with(100);

        assert!(item.cancel());
        assert_eq!(item.state(), DownloadState::Cancelled);
        assert!(!item.progress_timer_running());
        assert_eq!(updated_state(&mut rx), DownloadState::Cancelled);

        assert!(!item.cancel());
        assert!(rx.try_recv().is_err(), "second cancel must not notify");
    }

    #[test]
    fn test_cancel_after_finish_is_noop() {
        let (mut item, _rx) = item_with(100);
        item.finished(100);
        assert!(!item.cancel());
        assert_eq!(item.state(), DownloadState::Complete);
    }

    #[test]
    fn test_finished_with_zero_size_keeps_bytes() {
        let (mut item, _rx) = item_with(0);
        item.update(42);
        item.finished(0);
        assert_eq!(item.received_bytes(), 42);
        assert_eq!(item.state(), DownloadState::Complete);
    }

    #[test]
    fn test_remove_is_terminal() {
        let (mut item, _rx) = item_with(100);
        assert!(item.remove());
        assert_eq!(item.state(), DownloadState::Removing);
        assert!(!item.cancel());
        assert_eq!(item.state(), DownloadState::Removing);
    }

    #[test]
    fn test_speed_and_remaining_time() {
        let (mut item, _rx) = item_with(10_000);
        item.update(2_000);
        let later = item.start_tick + Duration::from_secs(2);

        assert_eq!(item.speed_at(later), 1_000);
        assert_eq!(item.time_remaining_at(later), Some(Duration::from_secs(8)));
        assert_eq!(item.speed_at(item.start_tick), 0);
        assert_eq!(item.time_remaining_at(item.start_tick), None);
    }

    #[test]
    fn test_toggle_pause_flips_flag() {
        let (mut item, _rx) = item_with(100);
        assert!(item.toggle_pause());
        assert!(!item.toggle_pause());
    }

    #[test]
    fn test_dangerous_item_shows_true_name() {
        let (tx, _rx) = broadcast::channel(8);
        let mut info = DownloadCreateInfo::new(DownloadId(5), "http://x/a.exe", "application/octet-stream");
        info.path = PathBuf::from("/d/unconfirmed 123.download");
        info.original_name = PathBuf::from("a.exe");
        info.path_uniquifier = 2;
        info.is_dangerous = true;

        let mut item = DownloadItem::new(ItemKey(1), &info, false, tx);
        assert_eq!(item.safety_state(), SafetyState::Dangerous);
        assert_eq!(item.display_name(), PathBuf::from("a (2).exe"));

        item.set_safety_state(SafetyState::Safe);
        assert_eq!(item.display_name(), PathBuf::from("unconfirmed 123.download"));
    }

    #[test]
    fn test_restored_in_progress_record_is_cancelled() {
        let (tx, _rx) = broadcast::channel(8);
        let record = DownloadRecord {
            db_handle: DbHandle(4),
            url: "http://x/big.iso".into(),
            full_path: PathBuf::from("/d/big.iso"),
            start_time: Utc::now(),
            received_bytes: 10,
            total_bytes: 100,
            state: DownloadState::InProgress,
        };

        let item = DownloadItem::from_record(ItemKey(2), &record, tx);
        assert_eq!(item.state(), DownloadState::Cancelled);
        assert_eq!(item.id(), DownloadId::UNASSIGNED);
        assert_eq!(item.db_handle(), DbHandle(4));
        assert!(!item.progress_timer_running());
    }
}
