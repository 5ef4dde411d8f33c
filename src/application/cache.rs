// Time-bounded caches for inventory and readings
use crate::domain::window::Window;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Identity of one readings query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub sensor_id: String,
    pub window: Window,
}

impl FetchKey {
    pub fn new(sensor_id: impl Into<String>, window: Window) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            window,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// Keyed cache where every entry expires `ttl` after it was stored.
///
/// Holds at most `max_entries` values. Inserting a new key into a full cache
/// first evicts the entry with the oldest store time, whatever its key.
/// Expired entries are not swept; they age out through eviction or overwrite.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    ttl: Duration,
    max_entries: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| now.saturating_duration_since(entry.stored_at) < self.ttl)
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    pub fn insert_at(&mut self, key: K, value: V, now: Instant) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }
        self.entries.insert(
            key,
            Entry {
                value,
                stored_at: now,
            },
        );
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.stored_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of entries that would still be served at `now`.
    pub fn fresh_len_at(&self, now: Instant) -> usize {
        self.entries
            .values()
            .filter(|entry| now.saturating_duration_since(entry.stored_at) < self.ttl)
            .count()
    }
}

/// Single-slot cache for the whole sensor inventory, refreshed wholesale.
#[derive(Debug)]
pub struct SnapshotCache<T> {
    snapshot: Option<(T, Instant)>,
    ttl: Duration,
}

impl<T: Clone> SnapshotCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            snapshot: None,
            ttl,
        }
    }

    pub fn get_at(&self, now: Instant) -> Option<T> {
        match &self.snapshot {
            Some((value, refreshed_at))
                if now.saturating_duration_since(*refreshed_at) < self.ttl =>
            {
                Some(value.clone())
            }
            _ => None,
        }
    }

    pub fn replace_at(&mut self, value: T, now: Instant) {
        self.snapshot = Some((value, now));
    }
}
