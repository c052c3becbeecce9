//! Per-key read-through cache with a caller-supplied TTL.
//!
//! Entries are disposable copies: nothing here is ever used to mutate a
//! breaker. Concurrent misses for one key may each call the loader.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::observability::metrics;

#[derive(Debug, Clone)]
struct CachedEntry<V> {
    value: V,
    loaded_at: DateTime<Utc>,
}

pub struct ReadThroughCache<V> {
    entries: DashMap<String, CachedEntry<V>>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ReadThroughCache<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Return the cached value if younger than `ttl`, else load and store it.
    ///
    /// A `None` TTL bypasses the cache entirely. Loader errors are returned
    /// and not cached.
    pub async fn get_or_load<F, Fut, E>(&self, key: &str, ttl: Option<Duration>, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let Some(ttl) = ttl else {
            return loader().await;
        };

        if let Some(value) = self.fresh(key, ttl) {
            metrics::record_cache_lookup(true);
            return Ok(value);
        }
        metrics::record_cache_lookup(false);

        let value = loader().await?;
        self.entries.insert(
            key.to_string(),
            CachedEntry {
                value: value.clone(),
                loaded_at: self.clock.now(),
            },
        );
        Ok(value)
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn fresh(&self, key: &str, ttl: Duration) -> Option<V> {
        let entry = self.entries.get(key)?;
        // A clock that moved backwards keeps the entry.
        let fresh = (self.clock.now() - entry.loaded_at)
            .to_std()
            .map(|age| age < ttl)
            .unwrap_or(true);
        fresh.then(|| entry.value.clone())
    }
}

impl<V> std::fmt::Debug for ReadThroughCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}
