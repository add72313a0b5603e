mod postgres;

pub use postgres::PgOrderStore;

use async_trait::async_trait;

use crate::models::Order;

// ============================================================================
// Persistent Store - system of record for order aggregates
// ============================================================================
//
// The trait is the seam between the pipeline (consumer, lookup, warmup) and
// the database. Production uses `PgOrderStore`; tests substitute an
// in-memory implementation so the pipeline is exercised without Postgres.
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Atomically replace the full aggregate for `order.order_uid`: header,
    /// delivery, and payment are upserted and the item set is replaced with
    /// exactly the supplied one. On failure nothing is applied - the prior
    /// state (if any) remains authoritative.
    async fn upsert(&self, order: &Order) -> Result<(), StoreError>;

    /// Fetch the full aggregate, or `None` if no header row exists. Missing
    /// delivery/payment rows are tolerated as empty sub-objects; items come
    /// back ordered by `chrt_id`.
    async fn get(&self, order_uid: &str) -> Result<Option<Order>, StoreError>;

    /// Up to `n` aggregates, most recently updated first. Warmup only.
    async fn load_recent(&self, n: i64) -> Result<Vec<Order>, StoreError>;

    /// Identifier-only variant of `load_recent`.
    async fn list_recent_ids(&self, n: i64) -> Result<Vec<String>, StoreError>;
}

// ============================================================================
// In-memory store for tests
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    /// Trait double that mirrors the Postgres contract: whole-aggregate
    /// replacement, recency ordered by last successful write, and a switch
    /// to simulate database failures.
    pub(crate) struct MemoryStore {
        inner: Mutex<Inner>,
        fail: AtomicBool,
    }

    #[derive(Default)]
    struct Inner {
        orders: HashMap<String, Order>,
        // most recently written last
        recency: Vec<String>,
    }

    impl MemoryStore {
        pub(crate) fn new() -> Self {
            Self {
                inner: Mutex::new(Inner::default()),
                fail: AtomicBool::new(false),
            }
        }

        /// Make every subsequent call fail with a database error.
        pub(crate) fn fail_next_calls(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        /// Model absent delivery/payment rows for an order. The read
        /// contract maps a missing 1:1 row to an empty sub-object rather
        /// than an error, even though writes always produce both.
        pub(crate) async fn drop_sub_rows(&self, order_uid: &str) {
            use crate::models::{Delivery, Payment};

            let mut inner = self.inner.lock().await;
            if let Some(order) = inner.orders.get_mut(order_uid) {
                order.delivery = Delivery::default();
                order.payment = Payment::default();
            }
        }

        fn check_available(&self) -> Result<(), StoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Database(sqlx::Error::PoolClosed));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl OrderStore for MemoryStore {
        async fn upsert(&self, order: &Order) -> Result<(), StoreError> {
            self.check_available()?;
            let mut inner = self.inner.lock().await;
            inner.recency.retain(|uid| uid != &order.order_uid);
            inner.recency.push(order.order_uid.clone());
            inner
                .orders
                .insert(order.order_uid.clone(), order.clone());
            Ok(())
        }

        async fn get(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
            self.check_available()?;
            let inner = self.inner.lock().await;
            Ok(inner.orders.get(order_uid).map(|order| {
                let mut order = order.clone();
                order.items.sort_by_key(|item| item.chrt_id);
                order
            }))
        }

        async fn load_recent(&self, n: i64) -> Result<Vec<Order>, StoreError> {
            self.check_available()?;
            let inner = self.inner.lock().await;
            Ok(inner
                .recency
                .iter()
                .rev()
                .take(n as usize)
                .filter_map(|uid| inner.orders.get(uid).cloned())
                .collect())
        }

        async fn list_recent_ids(&self, n: i64) -> Result<Vec<String>, StoreError> {
            self.check_available()?;
            let inner = self.inner.lock().await;
            Ok(inner.recency.iter().rev().take(n as usize).cloned().collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryStore;
    use super::*;
    use crate::models::tests::sample_order;
    use crate::models::{Delivery, Payment};

    #[tokio::test]
    async fn test_get_tolerates_missing_sub_rows() {
        let store = MemoryStore::new();
        let order = sample_order();
        store.upsert(&order).await.unwrap();
        store.drop_sub_rows(&order.order_uid).await;

        // A header without its 1:1 rows still reads as a whole aggregate,
        // with empty sub-objects in place of the missing rows.
        let read = store.get(&order.order_uid).await.unwrap().unwrap();
        assert_eq!(read.order_uid, order.order_uid);
        assert_eq!(read.delivery, Delivery::default());
        assert_eq!(read.payment, Payment::default());
        assert_eq!(read.items, order.items);
    }
}
