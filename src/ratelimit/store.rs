//! Concurrent per-client state storage.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

/// Concurrent map from client key to that client's window state.
///
/// Entries are created lazily on first access. Each state object sits
/// behind its own mutex, so read-modify-write for one client is a single
/// critical section while unrelated clients never contend with each
/// other; the map itself only locks per shard, and only for lookups and
/// inserts.
#[derive(Debug)]
pub struct WindowStore<S> {
    entries: DashMap<String, Arc<Mutex<S>>>,
}

impl<S> WindowStore<S> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Return the state for `key`, constructing it via `init` on first
    /// access.
    ///
    /// The entry API holds the shard write lock during insertion, so
    /// concurrent first access for one key constructs exactly one state
    /// object and every caller observes the same instance.
    pub fn get_or_create(&self, key: &str, init: impl FnOnce() -> S) -> Arc<Mutex<S>> {
        if let Some(existing) = self.entries.get(key) {
            return Arc::clone(existing.value());
        }

        Arc::clone(
            self.entries
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(init())))
                .value(),
        )
    }

    /// Whether the store holds state for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store tracks no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry for which `keep` returns `false`.
    ///
    /// Used by the idle-state sweep. Each state is locked while its
    /// predicate runs, so a sweep never observes a check mid-update.
    pub fn retain(&self, mut keep: impl FnMut(&str, &S) -> bool) {
        self.entries.retain(|key, state| keep(key, &state.lock()));
    }
}

impl<S> Default for WindowStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_creates_state_on_first_access() {
        let store: WindowStore<u32> = WindowStore::new();
        assert!(store.is_empty());

        let state = store.get_or_create("client", || 7);
        assert_eq!(*state.lock(), 7);
        assert_eq!(store.len(), 1);
        assert!(store.contains("client"));
    }

    #[test]
    fn test_returns_same_instance_for_key() {
        let store: WindowStore<u32> = WindowStore::new();

        let first = store.get_or_create("client", || 1);
        *first.lock() = 42;

        // The factory must not run again for a known key.
        let second = store.get_or_create("client", || unreachable!());
        assert_eq!(*second.lock(), 42);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_keys_are_isolated() {
        let store: WindowStore<u32> = WindowStore::new();

        let a = store.get_or_create("a", || 1);
        let b = store.get_or_create("b", || 2);

        *a.lock() += 10;
        assert_eq!(*b.lock(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_concurrent_first_access_creates_one_state() {
        let store: Arc<WindowStore<u32>> = Arc::new(WindowStore::new());
        let creations = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let creations = Arc::clone(&creations);
                std::thread::spawn(move || {
                    store.get_or_create("client", || {
                        creations.fetch_add(1, Ordering::SeqCst);
                        0
                    })
                })
            })
            .collect();

        let states: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(creations.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 1);
        for state in &states[1..] {
            assert!(Arc::ptr_eq(&states[0], state));
        }
    }

    #[test]
    fn test_retain_drops_only_matching_entries() {
        let store: WindowStore<u32> = WindowStore::new();
        store.get_or_create("stale", || 1);
        store.get_or_create("fresh", || 100);

        store.retain(|_, value| *value >= 100);

        assert_eq!(store.len(), 1);
        assert!(!store.contains("stale"));
        assert!(store.contains("fresh"));
    }
}
