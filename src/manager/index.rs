//! Authoritative item store with its derived views
//!
//! Items live in one map keyed by [`ItemKey`]. The in-progress, persisted,
//! dangerous-finished and pending-finished views only hold keys (or sizes), and
//! every mutation goes through a method here so the views never disagree.
//!
//! Ids announced by `StartDownload` but without an item yet are tracked in
//! `starting`; only those may have a completion buffered.

use std::collections::{HashMap, HashSet};

use crate::item::DownloadItem;
use crate::types::{DbHandle, DownloadId, ItemKey};

#[derive(Debug, Default)]
pub(crate) struct DownloadIndex {
    items: HashMap<ItemKey, DownloadItem>,
    in_progress: HashMap<DownloadId, ItemKey>,
    persisted: HashMap<DbHandle, ItemKey>,
    dangerous_finished: HashMap<DownloadId, ItemKey>,
    pending_finished: HashMap<DownloadId, u64>,
    starting: HashSet<DownloadId>,
    last_key: u64,
}

impl DownloadIndex {
    pub(crate) fn allocate_key(&mut self) -> ItemKey {
        self.last_key += 1;
        ItemKey(self.last_key)
    }

    /// Insert a freshly started item
    ///
    /// # Panics
    ///
    /// If an item with the same transfer id is already in progress.
    pub(crate) fn insert_in_progress(&mut self, item: DownloadItem) {
        let id = item.id();
        let key = item.key();
        assert!(
            !self.in_progress.contains_key(&id),
            "download {id} is already in progress"
        );
        self.starting.remove(&id);
        self.in_progress.insert(id, key);
        self.items.insert(key, item);
    }

    /// A transfer was announced; its item follows once the path is final
    pub(crate) fn begin_starting(&mut self, id: DownloadId) {
        self.starting.insert(id);
    }

    /// The announced transfer will never get an item
    pub(crate) fn abandon_starting(&mut self, id: DownloadId) -> Option<u64> {
        self.starting.remove(&id);
        self.pending_finished.remove(&id)
    }

    pub(crate) fn is_starting(&self, id: DownloadId) -> bool {
        self.starting.contains(&id)
    }

    /// Insert an item loaded from history. Returns `false` for a handle that
    /// is already known.
    pub(crate) fn insert_restored(&mut self, item: DownloadItem) -> bool {
        let handle = item.db_handle();
        if self.persisted.contains_key(&handle) {
            return false;
        }
        self.persisted.insert(handle, item.key());
        self.items.insert(item.key(), item);
        true
    }

    /// Give an item its durable handle and make it part of the persisted set
    ///
    /// # Panics
    ///
    /// If the item already has a handle or the handle is taken.
    pub(crate) fn assign_handle(&mut self, key: ItemKey, handle: DbHandle) {
        assert!(
            !self.persisted.contains_key(&handle),
            "handle {handle} assigned twice"
        );
        let Some(item) = self.items.get_mut(&key) else {
            return;
        };
        assert!(
            !item.db_handle().is_assigned(),
            "download {} already has handle {}",
            item.id(),
            item.db_handle()
        );
        item.set_db_handle(handle);
        self.persisted.insert(handle, key);
    }

    pub(crate) fn get(&self, key: ItemKey) -> Option<&DownloadItem> {
        self.items.get(&key)
    }

    pub(crate) fn get_mut(&mut self, key: ItemKey) -> Option<&mut DownloadItem> {
        self.items.get_mut(&key)
    }

    pub(crate) fn in_progress_key(&self, id: DownloadId) -> Option<ItemKey> {
        self.in_progress.get(&id).copied()
    }

    pub(crate) fn key_for_handle(&self, handle: DbHandle) -> Option<ItemKey> {
        self.persisted.get(&handle).copied()
    }

    /// Drop an item from the in-progress view (it stays known)
    pub(crate) fn leave_in_progress(&mut self, id: DownloadId) {
        self.in_progress.remove(&id);
    }

    pub(crate) fn in_progress_count(&self) -> usize {
        self.in_progress.len()
    }

    pub(crate) fn in_progress_keys(&self) -> Vec<ItemKey> {
        self.in_progress.values().copied().collect()
    }

    pub(crate) fn mark_dangerous_finished(&mut self, id: DownloadId, key: ItemKey) {
        self.dangerous_finished.insert(id, key);
    }

    pub(crate) fn clear_dangerous_finished(&mut self, id: DownloadId) {
        self.dangerous_finished.remove(&id);
    }

    pub(crate) fn is_dangerous_finished(&self, id: DownloadId) -> bool {
        self.dangerous_finished.contains_key(&id)
    }

    pub(crate) fn dangerous_finished_keys(&self) -> Vec<ItemKey> {
        self.dangerous_finished.values().copied().collect()
    }

    /// Remember a completion that arrived before its item exists
    pub(crate) fn buffer_finished(&mut self, id: DownloadId, size: u64) {
        if self.pending_finished.insert(id, size).is_some() {
            tracing::warn!(download_id = id.0, "download finished twice before it started");
        }
    }

    pub(crate) fn take_pending_finished(&mut self, id: DownloadId) -> Option<u64> {
        self.pending_finished.remove(&id)
    }

    pub(crate) fn pending_finished_size(&self, id: DownloadId) -> Option<u64> {
        self.pending_finished.get(&id).copied()
    }

    /// Keys of every persisted item
    pub(crate) fn persisted_keys(&self) -> Vec<ItemKey> {
        self.persisted.values().copied().collect()
    }

    pub(crate) fn persisted_items(&self) -> impl Iterator<Item = &DownloadItem> {
        self.persisted.values().filter_map(|key| self.items.get(key))
    }

    /// Remove an item from the store and from every view referencing it
    pub(crate) fn destroy(&mut self, key: ItemKey) -> Option<DownloadItem> {
        let item = self.items.remove(&key)?;
        if self.in_progress.get(&item.id()) == Some(&key) {
            self.in_progress.remove(&item.id());
        }
        if self.dangerous_finished.get(&item.id()) == Some(&key) {
            self.dangerous_finished.remove(&item.id());
        }
        if self.persisted.get(&item.db_handle()) == Some(&key) {
            self.persisted.remove(&item.db_handle());
        }
        self.pending_finished.remove(&item.id());
        Some(item)
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.in_progress.clear();
        self.persisted.clear();
        self.dangerous_finished.clear();
        self.pending_finished.clear();
        self.starting.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DownloadCreateInfo;
    use tokio::sync::broadcast;

    fn item(index: &mut DownloadIndex, id: i32) -> DownloadItem {
        let (tx, _) = broadcast::channel(4);
        let info = DownloadCreateInfo::new(DownloadId(id), "http://x/f", "text/plain");
        DownloadItem::new(index.allocate_key(), &info, false, tx)
    }

    #[test]
    #[should_panic(expected = "already in progress")]
    fn test_duplicate_in_progress_id_panics() {
        let mut index = DownloadIndex::default();
        let first = item(&mut index, 1);
        let second = item(&mut index, 1);
        index.insert_in_progress(first);
        index.insert_in_progress(second);
    }

    #[test]
    #[should_panic(expected = "already has handle")]
    fn test_double_handle_assignment_panics() {
        let mut index = DownloadIndex::default();
        let it = item(&mut index, 1);
        let key = it.key();
        index.insert_in_progress(it);
        index.assign_handle(key, DbHandle(1));
        index.assign_handle(key, DbHandle(2));
    }

    #[test]
    fn test_destroy_clears_every_view() {
        let mut index = DownloadIndex::default();
        let it = item(&mut index, 7);
        let key = it.key();
        index.insert_in_progress(it);
        index.assign_handle(key, DbHandle(3));
        index.mark_dangerous_finished(DownloadId(7), key);

        assert!(index.destroy(key).is_some());
        assert_eq!(index.in_progress_key(DownloadId(7)), None);
        assert_eq!(index.key_for_handle(DbHandle(3)), None);
        assert!(!index.is_dangerous_finished(DownloadId(7)));
        assert_eq!(index.len(), 0);
        assert!(index.destroy(key).is_none());
    }

    #[test]
    fn test_pending_finished_is_taken_once() {
        let mut index = DownloadIndex::default();
        index.buffer_finished(DownloadId(5), 1024);

        assert_eq!(index.pending_finished_size(DownloadId(5)), Some(1024));
        assert_eq!(index.take_pending_finished(DownloadId(5)), Some(1024));
        assert_eq!(index.take_pending_finished(DownloadId(5)), None);
    }

    #[test]
    fn test_restored_duplicate_handle_is_rejected() {
        let mut index = DownloadIndex::default();
        let (tx, _) = broadcast::channel(4);
        let record = crate::types::DownloadRecord {
            db_handle: DbHandle(9),
            url: "http://x/a".into(),
            full_path: "/d/a".into(),
            start_time: chrono::Utc::now(),
            received_bytes: 1,
            total_bytes: 1,
            state: crate::types::DownloadState::Complete,
        };
        let first = DownloadItem::from_record(index.allocate_key(), &record, tx.clone());
        let second = DownloadItem::from_record(index.allocate_key(), &record, tx);

        assert!(index.insert_restored(first));
        assert!(!index.insert_restored(second));
        assert_eq!(index.len(), 1);
    }
}
