use crate::cache::OrderCache;
use crate::store::OrderStore;

// ============================================================================
// Cache Warmup
// ============================================================================

/// Load the `n` most recently updated aggregates into the cache. Runs once,
/// before the consumer and the HTTP server are considered ready.
///
/// Failure is non-fatal: the process starts with a cold cache and misses
/// self-heal through the lookup path's backfill.
pub async fn warm_cache(store: &dyn OrderStore, cache: &OrderCache, n: i64) -> usize {
    match store.load_recent(n).await {
        Ok(orders) => {
            let count = orders.len();
            cache.warm(orders).await;
            tracing::info!(count = count, "Cache warmed");
            count
        }
        Err(e) => {
            tracing::warn!(error = %e, "Cache warmup failed, starting cold");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::sample_order;
    use crate::store::testing::MemoryStore;

    #[tokio::test]
    async fn test_warmup_loads_most_recent_orders() {
        let store = MemoryStore::new();
        let cache = OrderCache::new();
        for i in 0..5 {
            let mut order = sample_order();
            order.order_uid = format!("order-{i}");
            store.upsert(&order).await.unwrap();
        }

        let count = warm_cache(&store, &cache, 3).await;

        assert_eq!(count, 3);
        assert_eq!(cache.len().await, 3);
        // Recency wins: the three latest writes are present, the rest not.
        assert!(cache.get("order-4").await.is_some());
        assert!(cache.get("order-2").await.is_some());
        assert!(cache.get("order-0").await.is_none());
    }

    #[tokio::test]
    async fn test_warmup_failure_is_non_fatal() {
        let store = MemoryStore::new();
        store.fail_next_calls(true);
        let cache = OrderCache::new();

        let count = warm_cache(&store, &cache, 100).await;

        assert_eq!(count, 0);
        assert!(cache.is_empty().await);
    }
}
