//! Per-run page cache using moka
//!
//! Keyed by the raw authored URL. Concurrent lookups for the same key are
//! coalesced by moka, so the first resolution wins and later callers reuse it
//! instead of fetching again.

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache statistics for one verifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Verification lookups that reached the cache
    pub lookups: u64,
    /// Lookups that triggered a network resolution
    pub fetches: u64,
    /// Lookups served from cache
    pub hits: u64,
}

/// Insert-if-absent cache of resolved pages
#[derive(Debug)]
pub(crate) struct PageCache<V: Clone + Send + Sync + 'static> {
    inner: Cache<String, V>,
    lookups: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> PageCache<V> {
    pub(crate) fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
            lookups: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached value, computing it once on a miss
    pub(crate) async fn get_or_resolve<F, Fut>(&self, key: &str, resolve: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let misses = &self.misses;
        self.inner
            .get_with(key.to_string(), async move {
                misses.fetch_add(1, Ordering::SeqCst);
                resolve().await
            })
            .await
    }

    pub(crate) fn stats(&self) -> CacheStats {
        let lookups = self.lookups.load(Ordering::SeqCst);
        let fetches = self.misses.load(Ordering::SeqCst);
        CacheStats {
            lookups,
            fetches,
            hits: lookups.saturating_sub(fetches),
        }
    }
}
