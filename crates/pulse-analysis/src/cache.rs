//! Caching layer for quote histories to reduce market data calls

use crate::market::Quote;
use cached::{Cached, TimedCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cache key for a quote history request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoryKey {
    /// Market symbol
    pub symbol: String,
    /// Bar interval, e.g. `1d` or `1m`
    pub interval: String,
    /// Request window, as rendered by the source
    pub window: String,
}

impl HistoryKey {
    /// Create a new cache key
    pub fn new(
        symbol: impl Into<String>,
        interval: impl Into<String>,
        window: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
            window: window.into(),
        }
    }
}

/// Thread-safe, time-bounded cache of quote histories
pub struct HistoryCache {
    cache: Arc<RwLock<TimedCache<HistoryKey, Arc<Vec<Quote>>>>>,
}

impl HistoryCache {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// Get a history from the cache
    pub async fn get(&self, key: &HistoryKey) -> Option<Arc<Vec<Quote>>> {
        // TimedCache evicts on read, so lookups need the write lock
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    /// Insert a history into the cache
    pub async fn insert(&self, key: HistoryKey, value: Arc<Vec<Quote>>) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Get or fetch a history using the provided fetcher
    ///
    /// Empty histories are returned but never cached so that a symbol that
    /// starts trading, or a transient upstream gap, is retried next time.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: HistoryKey,
        fetcher: F,
    ) -> Result<Arc<Vec<Quote>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<Quote>, E>>,
    {
        if let Some(value) = self.get(&key).await {
            tracing::debug!(symbol = %key.symbol, interval = %key.interval, "History cache hit");
            return Ok(value);
        }

        tracing::debug!(symbol = %key.symbol, interval = %key.interval, "History cache miss");

        let value = Arc::new(fetcher().await?);
        if !value.is_empty() {
            self.insert(key, Arc::clone(&value)).await;
        }

        Ok(value)
    }

    /// Clear all cached entries
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    /// Get the number of cached entries
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Clone for HistoryCache {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::memory::synthetic_quotes;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key() -> HistoryKey {
        HistoryKey::new("AAPL", "1d", "2024-01-01..2024-02-01")
    }

    fn quotes() -> Vec<Quote> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        synthetic_quotes(start, 5, 100.0)
    }

    #[tokio::test]
    async fn test_cache_insert_and_get() {
        let cache = HistoryCache::new(Duration::from_secs(60));
        assert!(cache.is_empty().await);

        cache.insert(key(), Arc::new(quotes())).await;

        let cached = cache.get(&key()).await.unwrap();
        assert_eq!(cached.len(), 5);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_or_fetch_calls_fetcher_once() {
        let cache = HistoryCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let result: Result<_, String> = cache
                .get_or_fetch(key(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(quotes())
                })
                .await;
            assert_eq!(result.unwrap().len(), 5);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_history_not_cached() {
        let cache = HistoryCache::new(Duration::from_secs(60));

        let result: Result<_, String> = cache.get_or_fetch(key(), || async { Ok(Vec::new()) }).await;
        assert!(result.unwrap().is_empty());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let cache = HistoryCache::new(Duration::from_secs(60));

        let result = cache
            .get_or_fetch(key(), || async { Err::<Vec<Quote>, _>("upstream down".to_string()) })
            .await;
        assert_eq!(result.unwrap_err(), "upstream down");

        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
