use std::sync::Arc;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use tokio_util::sync::CancellationToken;

use crate::cache::OrderCache;
use crate::metrics::Metrics;
use crate::models::Order;
use crate::store::OrderStore;

// ============================================================================
// Order Consumer - write-through ingestion from Kafka
// ============================================================================
//
// One message, one aggregate. Per message:
// 1. Decode. A payload that does not parse, or parses without an order_uid,
//    is acknowledged and skipped - poison must not block the partition.
// 2. Upsert into the store. On failure the offset is NOT committed, so the
//    broker redelivers under its at-least-once contract. No internal retry.
// 3. Mirror into the cache, then commit the offset.
//
// Offsets are committed manually (enable.auto.commit=false): the cursor only
// advances once the side effects for that message have landed. Upsert
// semantics make reprocessing a duplicate delivery a no-op.
//
// Within a partition messages are handled strictly in arrival order; across
// partitions nothing is guaranteed. Deployments that need per-order ordering
// are expected to key messages by order_uid so an order's updates share a
// partition - an assumption, not something enforced here.
// ============================================================================

pub struct OrderConsumer {
    consumer: StreamConsumer,
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
    metrics: Arc<Metrics>,
}

/// What to do with the offset after handling a message.
#[derive(Debug, PartialEq, Eq)]
enum Disposition {
    /// Commit the offset: the message is fully handled (or poison).
    Ack,
    /// Leave the offset alone so the broker redelivers the message.
    Redeliver,
}

impl OrderConsumer {
    pub fn new(
        brokers: &str,
        group_id: &str,
        topic: &str,
        store: Arc<dyn OrderStore>,
        cache: Arc<OrderCache>,
        metrics: Arc<Metrics>,
    ) -> anyhow::Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;

        consumer.subscribe(&[topic])?;
        tracing::info!(brokers = %brokers, topic = %topic, group_id = %group_id, "Kafka consumer subscribed");

        Ok(Self {
            consumer,
            store,
            cache,
            metrics,
        })
    }

    /// Consume until the shutdown token fires. Receive errors (rebalances,
    /// broker hiccups) are logged and the loop keeps claiming; only
    /// cancellation ends it.
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown signal observed, consumer stopping");
                    return;
                }
                received = self.consumer.recv() => {
                    let message = match received {
                        Ok(message) => message,
                        Err(e) => {
                            tracing::warn!(error = %e, "Kafka receive error, continuing");
                            continue;
                        }
                    };

                    let payload = message.payload().unwrap_or_default();
                    let disposition =
                        ingest(self.store.as_ref(), &self.cache, &self.metrics, payload).await;

                    if disposition == Disposition::Ack {
                        if let Err(e) = self.consumer.commit_message(&message, CommitMode::Async) {
                            tracing::warn!(error = %e, "Offset commit failed");
                        }
                    }
                }
            }
        }
    }
}

/// Apply one message's side effects: store first, cache second. Kept free of
/// the Kafka client so the decode/persist/mirror contract is testable on its
/// own.
async fn ingest(
    store: &dyn OrderStore,
    cache: &OrderCache,
    metrics: &Metrics,
    payload: &[u8],
) -> Disposition {
    let order: Order = match serde_json::from_slice(payload) {
        Ok(order) => order,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping undecodable message");
            metrics.ingest_skipped.with_label_values(&["decode"]).inc();
            return Disposition::Ack;
        }
    };

    if order.order_uid.is_empty() {
        tracing::warn!("Skipping message with empty order_uid");
        metrics
            .ingest_skipped
            .with_label_values(&["empty_uid"])
            .inc();
        return Disposition::Ack;
    }

    if let Err(e) = store.upsert(&order).await {
        tracing::error!(order_uid = %order.order_uid, error = %e, "Upsert failed, awaiting redelivery");
        metrics.ingest_failed.inc();
        return Disposition::Redeliver;
    }

    // Cache only after the store committed: the cache must never hold a
    // version the store does not.
    cache.set(&order).await;
    metrics.orders_ingested.inc();
    metrics.cache_entries.set(cache.len().await as i64);
    tracing::info!(order_uid = %order.order_uid, "Order persisted and cached");

    Disposition::Ack
}

// ============================================================================
// Unit Tests
// ============================================================================
