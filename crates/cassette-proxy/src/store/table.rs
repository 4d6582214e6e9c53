//! Lock-guarded keyed table backing both stores.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

struct Entry<T> {
    revision: u64,
    value: T,
}

/// id -> value map where every write is stamped with a monotonically
/// increasing revision, so "most recently written" is well defined.
pub(crate) struct Table<T> {
    entries: RwLock<HashMap<String, Entry<T>>>,
    revision: AtomicU64,
}

impl<T: Clone> Table<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            revision: AtomicU64::new(0),
        }
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.entries.read().get(id).map(|e| e.value.clone())
    }

    /// Insert or replace. Returns true if an entry was replaced.
    pub fn upsert(&self, id: String, value: T) -> bool {
        let mut entries = self.entries.write();
        let revision = self.next_revision();
        entries.insert(id, Entry { revision, value }).is_some()
    }

    /// Insert only if `id` is free. Returns false (and leaves the table
    /// untouched) when it is taken.
    pub fn insert_new(&self, id: String, value: T) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(&id) {
            return false;
        }
        let revision = self.next_revision();
        entries.insert(id, Entry { revision, value });
        true
    }

    /// Apply `f` to an existing entry, bumping its revision.
    pub fn update<F: FnOnce(&mut T)>(&self, id: &str, f: F) -> bool {
        let mut entries = self.entries.write();
        let revision = self.next_revision();
        match entries.get_mut(id) {
            Some(entry) => {
                f(&mut entry.value);
                entry.revision = revision;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &str) -> Option<T> {
        self.entries.write().remove(id).map(|e| e.value)
    }

    /// Snapshot of every entry.
    pub fn snapshot(&self) -> HashMap<String, T> {
        self.entries
            .read()
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// The most recently written entry satisfying `pred`.
    pub fn find_latest<P: Fn(&T) -> bool>(&self, pred: P) -> Option<T> {
        self.entries
            .read()
            .values()
            .filter(|e| pred(&e.value))
            .max_by_key(|e| e.revision)
            .map(|e| e.value.clone())
    }
}
