use dashmap::DashMap;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Small TTL cache owned by whoever needs it and passed down explicitly;
/// there is no module-level global instance.
pub struct TtlCache<V> {
    entries: DashMap<String, Entry<V>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> TtlCache<V> {
        TtlCache {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        if let Some(entry) = self.entries.get(key) {
            if Instant::now() < entry.expires_at {
                return Some(entry.value.clone());
            }
            drop(entry);
            self.entries.remove(key);
        }
        None
    }

    pub fn insert(&self, key: &str, value: V) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }
}
