//! Capacity-bounded LRU map used for render chunks, tiles and memoized
//! coordinate conversions.

use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;
use rustc_hash::FxBuildHasher;

/// Recency-ordered map that evicts the least-recently-used entry on overflow.
///
/// `len()` never exceeds `capacity()`. A capacity of zero is treated as one.
pub struct BoundedCache<K: Hash + Eq, V> {
    inner: LruCache<K, V, FxBuildHasher>,
}

impl<K: Hash + Eq, V> BoundedCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::with_hasher(capacity, FxBuildHasher::default()),
        }
    }

    /// Inserts or replaces `key`, marking it most recently used.
    ///
    /// Returns the entry evicted to make room, if any. Replacing an existing
    /// key never evicts.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.inner.contains(&key) {
            self.inner.put(key, value);
            None
        } else {
            self.inner.push(key, value)
        }
    }

    /// Looks up `key` and marks it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    /// Looks up `key` without touching recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.inner.peek(key)
    }

    /// Membership test without touching recency.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.pop(key)
    }

    /// Entries from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Changes the capacity. Shrinking evicts least-recently-used entries,
    /// which are returned oldest first.
    pub fn resize(&mut self, capacity: usize) -> Vec<(K, V)> {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let mut evicted = Vec::new();
        while self.inner.len() > capacity.get() {
            match self.inner.pop_lru() {
                Some(entry) => evicted.push(entry),
                None => break,
            }
        }
        self.inner.resize(capacity);
        evicted
    }

    /// Removes every entry for which `keep` returns false and returns the
    /// removed keys.
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &V) -> bool) -> Vec<K>
    where
        K: Clone,
    {
        let doomed: Vec<K> = self
            .inner
            .iter()
            .filter(|&(k, v)| !keep(k, v))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            self.inner.pop(key);
        }
        doomed
    }
}

impl<K: Hash + Eq, V> std::fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
