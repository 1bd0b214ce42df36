//! # LRU Cache
//!
//! Bounded least-recently-used cache for live chat sessions.
//!
//! ## Design
//!
//! - Entries live in a `BTreeMap` keyed by `K`, so iteration order is
//!   deterministic.
//! - Recency is tracked with a logical clock (a monotonic counter), not wall
//!   time. A second `BTreeMap` from tick to key gives the oldest entry in
//!   `O(log n)`.
//! - Inserting into a full cache evicts exactly one entry and hands it back,
//!   so the caller can persist what was pushed out.

use std::collections::BTreeMap;

/// Default number of live entries.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    tick: u64,
}

/// LRU cache with deterministic ordering.
#[derive(Debug, Clone)]
pub struct LruCache<K: Ord + Clone, V> {
    slots: BTreeMap<K, Slot<V>>,
    recency: BTreeMap<u64, K>,
    capacity: usize,
    clock: u64,
    hits: u64,
    misses: u64,
}

impl<K: Ord + Clone, V> Default for LruCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<K: Ord + Clone, V> LruCache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: BTreeMap::new(),
            recency: BTreeMap::new(),
            capacity: capacity.max(1),
            clock: 0,
            hits: 0,
            misses: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock = self.clock.saturating_add(1);
        self.clock
    }

    fn touch(&mut self, key: &K) -> bool {
        let now = self.tick();
        match self.slots.get_mut(key) {
            Some(slot) => {
                self.recency.remove(&slot.tick);
                slot.tick = now;
                self.recency.insert(now, key.clone());
                true
            }
            None => false,
        }
    }

    /// Look up a value, marking it as most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.get_mut(key).map(|v| &*v)
    }

    /// Mutable lookup, marking the entry as most recently used.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if self.touch(key) {
            self.hits = self.hits.saturating_add(1);
            self.slots.get_mut(key).map(|slot| &mut slot.value)
        } else {
            self.misses = self.misses.saturating_add(1);
            None
        }
    }

    /// Look up a value without affecting recency or statistics.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.slots.get(key).map(|slot| &slot.value)
    }

    /// Insert or replace a value.
    ///
    /// Returns the entry evicted to make room, if any. Replacing an existing
    /// key never evicts.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        let now = self.tick();

        if let Some(slot) = self.slots.get_mut(&key) {
            self.recency.remove(&slot.tick);
            slot.value = value;
            slot.tick = now;
            self.recency.insert(now, key);
            return None;
        }

        let evicted = if self.slots.len() >= self.capacity {
            self.pop_oldest()
        } else {
            None
        };

        self.recency.insert(now, key.clone());
        self.slots.insert(key, Slot { value, tick: now });
        evicted
    }

    fn pop_oldest(&mut self) -> Option<(K, V)> {
        let (_, key) = self.recency.pop_first()?;
        self.slots.remove(&key).map(|slot| (key, slot.value))
    }

    /// Remove an entry.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.slots.remove(key)?;
        self.recency.remove(&slot.tick);
        Some(slot.value)
    }

    /// Remove every entry, returning them in key order.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        self.recency.clear();
        std::mem::take(&mut self.slots)
            .into_iter()
            .map(|(k, slot)| (k, slot.value))
            .collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// True when the key is present.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.slots.keys()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots.iter().map(|(k, slot)| (k, &slot.value))
    }

    /// Usage statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let total = self.hits.saturating_add(self.misses);
        let hit_rate_percent = if total == 0 {
            0
        } else {
            (self.hits.saturating_mul(100) / total) as u8
        };
        CacheStats {
            size: self.slots.len(),
            capacity: self.capacity,
            hits: self.hits,
            misses: self.misses,
            hit_rate_percent,
        }
    }
}

/// Cache usage statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of entries.
    pub size: usize,
    /// Maximum number of entries.
    pub capacity: usize,
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Hit rate as an integer percentage (0-100).
    pub hit_rate_percent: u8,
}

// =============================================================================
// TESTS
// =============================================================================
