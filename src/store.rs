//! Locally held hub state.
//!
//! Every write is a total replacement: a new stream record or a whole new
//! collection. Readers get clones, so a snapshot never changes under them.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::{NewsPost, ScheduleEvent, StreamRecord};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Holds the one current [`StreamRecord`].
#[derive(Debug, Default)]
pub struct StreamStateStore {
    current: RwLock<Option<StreamRecord>>,
}

impl StreamStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<StreamRecord> {
        read(&self.current).clone()
    }

    /// Replaces the whole record; fields absent in `record` do not survive.
    pub fn replace(&self, record: StreamRecord) {
        *write(&self.current) = Some(record);
    }
}

/// An unordered collection, replaced wholesale on every sync.
#[derive(Debug)]
pub struct CollectionStore<T> {
    items: RwLock<Vec<T>>,
}

impl<T> Default for CollectionStore<T> {
    fn default() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }
}

impl<T: Clone> CollectionStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Vec<T> {
        read(&self.items).clone()
    }

    pub fn len(&self) -> usize {
        read(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.items).is_empty()
    }

    pub fn replace(&self, items: Vec<T>) {
        *write(&self.items) = items;
    }
}

/// Everything the display layer reads, shared between the scheduler and the admin gateway.
#[derive(Debug, Default)]
pub struct HubState {
    pub stream: StreamStateStore,
    pub schedule: CollectionStore<ScheduleEvent>,
    pub news: CollectionStore<NewsPost>,
}

impl HubState {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, sport: Option<&str>) -> StreamRecord {
        StreamRecord {
            id,
            title: format!("Stream {id}"),
            url: format!("https://player.example/{id}"),
            is_live: true,
            sport: sport.map(str::to_string),
        }
    }

    #[test]
    fn test_stream_store_starts_empty() {
        let store = StreamStateStore::new();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_replace_does_not_merge_fields() {
        let store = StreamStateStore::new();
        store.replace(record(1, Some("Biathlon")));
        store.replace(record(2, None));

        let current = store.get().unwrap();
        assert_eq!(current.id, 2);
        assert!(current.sport.is_none(), "stale sport must not survive a replace");
    }

    #[test]
    fn test_snapshot_is_independent_of_later_writes() {
        let store = StreamStateStore::new();
        store.replace(record(1, None));
        let snapshot = store.get().unwrap();
        store.replace(record(2, None));
        assert_eq!(snapshot.id, 1);
    }

    #[test]
    fn test_collection_replace_is_total() {
        let news: CollectionStore<i32> = CollectionStore::new();
        news.replace(vec![1, 2, 3]);
        assert_eq!(news.len(), 3);

        news.replace(Vec::new());
        assert!(news.is_empty());
        assert_eq!(news.get(), Vec::<i32>::new());
    }

    #[test]
    fn test_collection_keeps_received_order() {
        let schedule: CollectionStore<&str> = CollectionStore::new();
        schedule.replace(vec!["c", "a", "b"]);
        assert_eq!(schedule.get(), vec!["c", "a", "b"]);
    }
}
