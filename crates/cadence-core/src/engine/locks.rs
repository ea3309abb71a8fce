//! Keyed mutual exclusion
//!
//! One mutex per key, created on demand and dropped from the table once no
//! caller holds or waits on it.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
pub struct KeyedLocks<K> {
    table: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`
    pub fn with_lock<T>(&self, key: &K, f: impl FnOnce() -> T) -> T {
        let entry = Arc::clone(self.table().entry(key.clone()).or_default());
        let _release = Release {
            locks: self,
            key,
            entry: &entry,
        };

        // Poison carries no data here
        let _guard = entry.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Keys with a live lock entry
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn table(&self) -> MutexGuard<'_, HashMap<K, Arc<Mutex<()>>>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drops the table entry for `key` on exit, unwinding included
struct Release<'a, K: Eq + Hash + Clone> {
    locks: &'a KeyedLocks<K>,
    key: &'a K,
    entry: &'a Arc<Mutex<()>>,
}

impl<K: Eq + Hash + Clone> Drop for Release<'_, K> {
    fn drop(&mut self) {
        let mut table = self.locks.table();
        // Table and this handle are the only owners: nobody else is waiting
        if Arc::strong_count(self.entry) == 2 {
            table.remove(self.key);
        }
    }
}
