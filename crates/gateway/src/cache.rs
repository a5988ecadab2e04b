//! Time-bounded response cache keyed by upload digest.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

pub struct ResponseCache<V> {
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, V)>>,
}

impl<V: Clone> ResponseCache<V> {
    /// A zero `ttl` disables caching.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|(stored, _)| stored.elapsed() < self.ttl)
            .map(|(_, value)| value.clone())
    }

    /// Store `value`, dropping expired entries on the way.
    pub async fn insert(&self, key: impl Into<String>, value: V) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.write().await;
        entries.retain(|_, (stored, _)| stored.elapsed() < self.ttl);
        entries.insert(key.into(), (Instant::now(), value));
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
