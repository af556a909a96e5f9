//! Entry Store Module
//!
//! Concurrent key to entry mapping. Every caller reads and writes it directly;
//! only the maintenance pipeline removes entries on behalf of the eviction and
//! expiration policy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

use crate::cache::{CacheEntry, EntryMeta};

// == Entry Store ==
/// Sharded map of live entries.
#[derive(Debug)]
pub struct EntryStore<V> {
    entries: DashMap<String, CacheEntry<V>>,
    next_generation: AtomicU64,
}

impl<V> EntryStore<V> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_generation: AtomicU64::new(1),
        }
    }

    // == Upsert ==
    /// Inserts or replaces the entry for `key` and returns its metadata.
    ///
    /// The generation is drawn while the shard lock is held, so generations
    /// observed for a single key only ever grow.
    pub fn upsert(&self, key: String, value: V, ttl: Option<Duration>) -> EntryMeta {
        let slot = self.entries.entry(key);
        let entry = CacheEntry::new(value, ttl, self.bump_generation());
        let meta = entry.meta;
        slot.insert(entry);
        meta
    }

    // == Delete ==
    /// Removes `key` and returns the metadata of the removed entry.
    ///
    /// Deleting an absent key is a no-op returning None.
    pub fn delete(&self, key: &str) -> Option<EntryMeta> {
        self.entries.remove(key).map(|(_, entry)| entry.meta)
    }

    // == Remove If Generation ==
    /// Removes `key` only if it still holds the given generation.
    ///
    /// Used by maintenance so that a decision taken on stale bookkeeping never
    /// removes a newer write.
    pub fn remove_if_generation(&self, key: &str, generation: u64) -> bool {
        self.entries
            .remove_if(key, |_, entry| entry.meta.generation == generation)
            .is_some()
    }

    /// Returns the metadata of the entry currently stored for `key`, expired or not.
    pub fn meta(&self, key: &str) -> Option<EntryMeta> {
        self.entries.get(key).map(|entry| entry.meta)
    }

    /// Returns the metadata of every entry, expired ones included.
    pub fn snapshot(&self) -> Vec<(String, EntryMeta)> {
        self.entries
            .iter()
            .map(|item| (item.key().clone(), item.value().meta))
            .collect()
    }

    /// Number of physically present entries, including expired ones not yet swept.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entry is present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn bump_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }
}

impl<V: Clone> EntryStore<V> {
    // == Lookup ==
    /// Returns a copy of the live entry for `key`.
    ///
    /// An entry past its deadline is reported absent even while it is still
    /// physically present.
    pub fn lookup(&self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            return None;
        }
        Some(entry.value().clone())
    }
}

impl<V> Default for EntryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread::sleep;

    #[test]
    fn test_store_new() {
        let store: EntryStore<String> = EntryStore::new();
        assert_eq!(store.size(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_upsert_and_lookup() {
        let store = EntryStore::new();

        store.upsert("key1".to_string(), "value1".to_string(), None);
        let entry = store.lookup("key1").unwrap();

        assert_eq!(entry.value, "value1");
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_store_lookup_nonexistent() {
        let store: EntryStore<String> = EntryStore::new();
        assert!(store.lookup("nonexistent").is_none());
    }

    #[test]
    fn test_store_overwrite_bumps_generation() {
        let store = EntryStore::new();

        let first = store.upsert("key1".to_string(), 1, None);
        let second = store.upsert("key1".to_string(), 2, None);

        assert!(second.generation > first.generation);
        assert_eq!(store.lookup("key1").unwrap().value, 2);
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_store_delete_is_idempotent() {
        let store = EntryStore::new();

        store.upsert("key1".to_string(), 1, None);
        assert!(store.delete("key1").is_some());
        assert!(store.delete("key1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_lookup_hides_expired_entry() {
        let store = EntryStore::new();

        store.upsert("key1".to_string(), 1, Some(Duration::from_millis(30)));
        assert!(store.lookup("key1").is_some());

        sleep(Duration::from_millis(50));

        assert!(store.lookup("key1").is_none());
        // Still physically present until maintenance sweeps it
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_remove_if_generation_skips_newer_write() {
        let store = EntryStore::new();

        let old = store.upsert("key1".to_string(), 1, None);
        let new = store.upsert("key1".to_string(), 2, None);

        assert!(!store.remove_if_generation("key1", old.generation));
        assert_eq!(store.size(), 1);
        assert!(store.remove_if_generation("key1", new.generation));
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_lists_all_entries() {
        let store = EntryStore::new();
        store.upsert("a".to_string(), 1, None);
        store.upsert("b".to_string(), 2, None);

        let mut keys: Vec<String> = store.snapshot().into_iter().map(|(k, _)| k).collect();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_concurrent_upserts() {
        let store = Arc::new(EntryStore::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store.upsert(format!("k{}", i), t, None);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.size(), 100);
    }
}
