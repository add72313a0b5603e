use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::OrderCache;
use crate::metrics::Metrics;
use crate::models::Order;
use crate::store::{OrderStore, StoreError};

// ============================================================================
// Lookup Service - cache-aside point reads
// ============================================================================
//
// Read-only path: probe the cache, fall back to the store, and backfill the
// cache on a miss so it heals itself. A bypass flag (or a globally disabled
// cache) skips the cache on both the probe and the backfill, so a bypassed
// read always reflects the current store state and never mutates the cache.
// ============================================================================

/// Which tier satisfied a lookup. Observability metadata, not data contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Db,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Cache => "cache",
            Source::Db => "db",
        }
    }
}

#[derive(Debug)]
pub struct Lookup {
    pub order: Order,
    pub source: Source,
    pub elapsed: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// Well-formed query, no stored record. Distinct from a store failure;
    /// the cache is never populated for this outcome.
    #[error("order not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct LookupService {
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
    cache_enabled: bool,
    metrics: Arc<Metrics>,
}

impl LookupService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        cache: Arc<OrderCache>,
        cache_enabled: bool,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            cache,
            cache_enabled,
            metrics,
        }
    }

    pub async fn get(&self, order_uid: &str, bypass: bool) -> Result<Lookup, LookupError> {
        let start = Instant::now();
        let use_cache = self.cache_enabled && !bypass;

        if use_cache {
            if let Some(order) = self.cache.get(order_uid).await {
                let elapsed = start.elapsed();
                self.observe(Source::Cache, elapsed);
                tracing::debug!(
                    order_uid = %order_uid,
                    source = "cache",
                    elapsed_us = elapsed.as_micros() as u64,
                    "Lookup served"
                );
                return Ok(Lookup {
                    order,
                    source: Source::Cache,
                    elapsed,
                });
            }
            tracing::debug!(order_uid = %order_uid, "Cache miss");
        }

        let order = self
            .store
            .get(order_uid)
            .await?
            .ok_or(LookupError::NotFound)?;

        // A miss today becomes a hit tomorrow. Bypassed reads stay
        // side-effect free.
        if use_cache {
            self.cache.set(&order).await;
            self.metrics.cache_entries.set(self.cache.len().await as i64);
        }

        let elapsed = start.elapsed();
        self.observe(Source::Db, elapsed);
        tracing::debug!(
            order_uid = %order_uid,
            source = "db",
            elapsed_us = elapsed.as_micros() as u64,
            "Lookup served"
        );
        Ok(Lookup {
            order,
            source: Source::Db,
            elapsed,
        })
    }

    fn observe(&self, source: Source, elapsed: Duration) {
        self.metrics
            .lookups_total
            .with_label_values(&[source.as_str()])
            .inc();
        self.metrics
            .lookup_duration
            .with_label_values(&[source.as_str()])
            .observe(elapsed.as_secs_f64());
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::sample_order;
    use crate::store::testing::MemoryStore;

    fn service(
        store: Arc<MemoryStore>,
        cache: Arc<OrderCache>,
        cache_enabled: bool,
    ) -> LookupService {
        LookupService::new(
            store,
            cache,
            cache_enabled,
            Arc::new(Metrics::new().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_cache_hit_short_circuits_the_store() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(OrderCache::new());
        let order = sample_order();
        cache.set(&order).await;
        // Store down: a cache hit must still be served.
        store.fail_next_calls(true);

        let svc = service(store, cache, true);
        let lookup = svc.get(&order.order_uid, false).await.unwrap();

        assert_eq!(lookup.source, Source::Cache);
        assert_eq!(lookup.order, order);
    }

    #[tokio::test]
    async fn test_miss_self_heals_the_cache() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(OrderCache::new());
        let order = sample_order();
        store.upsert(&order).await.unwrap();

        let svc = service(store, cache.clone(), true);

        let first = svc.get(&order.order_uid, false).await.unwrap();
        assert_eq!(first.source, Source::Db);
        assert_eq!(first.order, order);

        let second = svc.get(&order.order_uid, false).await.unwrap();
        assert_eq!(second.source, Source::Cache);
        assert_eq!(second.order, order);
    }

    #[tokio::test]
    async fn test_bypass_reads_the_store_and_leaves_the_cache_alone() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(OrderCache::new());
        let mut stale = sample_order();
        stale.track_number = "STALE".to_string();
        cache.set(&stale).await;

        let mut fresh = stale.clone();
        fresh.track_number = "FRESH".to_string();
        store.upsert(&fresh).await.unwrap();

        let svc = service(store, cache.clone(), true);
        let lookup = svc.get(&fresh.order_uid, true).await.unwrap();

        assert_eq!(lookup.source, Source::Db);
        assert_eq!(lookup.order.track_number, "FRESH");
        // The stale entry stays exactly as it was.
        assert_eq!(
            cache.get(&fresh.order_uid).await.unwrap().track_number,
            "STALE"
        );
    }

    #[tokio::test]
    async fn test_disabled_cache_behaves_like_bypass() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(OrderCache::new());
        let order = sample_order();
        store.upsert(&order).await.unwrap();

        let svc = service(store, cache.clone(), false);
        let lookup = svc.get(&order.order_uid, false).await.unwrap();

        assert_eq!(lookup.source, Source::Db);
        assert!(cache.get(&order.order_uid).await.is_none());
    }

    #[tokio::test]
    async fn test_not_found_is_distinct_and_never_cached() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(OrderCache::new());

        let svc = service(store, cache.clone(), true);
        let err = svc.get("missing", false).await.unwrap_err();

        assert!(matches!(err, LookupError::NotFound));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_error_surfaces_as_internal() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next_calls(true);
        let cache = Arc::new(OrderCache::new());

        let svc = service(store, cache, true);
        let err = svc.get("abc123", false).await.unwrap_err();

        assert!(matches!(err, LookupError::Store(_)));
    }
}
