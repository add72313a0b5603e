use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::models::Order;

// ============================================================================
// Order Cache - process-local mirror of the store
// ============================================================================
//
// A concurrent map from `order_uid` to the full aggregate. Populated three
// ways: warmup at startup, write-through from the consumer, and backfill on
// a lookup miss. Entries are replaced wholesale, never merged, so a reader
// can never observe a half-written aggregate.
//
// There is deliberately no eviction, TTL, or size bound: the cache is a
// growing mirror of every order seen or looked up, bounded only by process
// memory. Bounding it is an operational decision layered elsewhere, not a
// policy hidden in this map.
// ============================================================================

pub struct OrderCache {
    entries: RwLock<HashMap<String, Order>>,
}

impl OrderCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Look up an order by identifier. Safe for unbounded concurrent readers.
    pub async fn get(&self, order_uid: &str) -> Option<Order> {
        self.entries.read().await.get(order_uid).cloned()
    }

    /// Insert or overwrite the entry for `order.order_uid`. Last writer wins.
    pub async fn set(&self, order: &Order) {
        self.entries
            .write()
            .await
            .insert(order.order_uid.clone(), order.clone());
    }

    /// Bulk-load entries under a single write lock. Used once at warmup.
    pub async fn warm(&self, orders: Vec<Order>) {
        let mut entries = self.entries.write().await;
        for order in orders {
            entries.insert(order.order_uid.clone(), order);
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for OrderCache {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
