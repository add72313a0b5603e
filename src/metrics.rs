use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

// ============================================================================
// Metrics - Prometheus instrumentation for the pipeline
// ============================================================================
//
// Counters and histograms for both halves of the pipeline:
// - ingestion (consumed, skipped poison messages, failed store writes)
// - lookups (which tier answered, how long it took)
// - cache occupancy
//
// Registered once at startup and scraped via /metrics on the HTTP server.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Ingestion
    pub orders_ingested: IntCounter,
    pub ingest_skipped: IntCounterVec,
    pub ingest_failed: IntCounter,

    // Lookups
    pub lookups_total: IntCounterVec,
    pub lookup_duration: HistogramVec,

    // Cache
    pub cache_entries: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_ingested = IntCounter::new(
            "orders_ingested_total",
            "Orders successfully persisted and cached from the event stream",
        )?;
        registry.register(Box::new(orders_ingested.clone()))?;

        let ingest_skipped = IntCounterVec::new(
            Opts::new(
                "ingest_skipped_total",
                "Messages acknowledged without a write (poison payloads)",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(ingest_skipped.clone()))?;

        let ingest_failed = IntCounter::new(
            "ingest_failed_total",
            "Store writes that failed; the message stays unacknowledged",
        )?;
        registry.register(Box::new(ingest_failed.clone()))?;

        let lookups_total = IntCounterVec::new(
            Opts::new("order_lookups_total", "Order lookups by serving tier"),
            &["source"],
        )?;
        registry.register(Box::new(lookups_total.clone()))?;

        let lookup_duration = HistogramVec::new(
            HistogramOpts::new(
                "order_lookup_duration_seconds",
                "Order lookup latency by serving tier",
            )
            .buckets(vec![0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
            &["source"],
        )?;
        registry.register(Box::new(lookup_duration.clone()))?;

        let cache_entries = IntGauge::new(
            "cache_entries",
            "Number of aggregates currently held by the in-memory cache",
        )?;
        registry.register(Box::new(cache_entries.clone()))?;

        Ok(Self {
            registry,
            orders_ingested,
            ingest_skipped,
            ingest_failed,
            lookups_total,
            lookup_duration,
            cache_entries,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let metrics = Metrics::new().unwrap();

        metrics.orders_ingested.inc();
        metrics.ingest_skipped.with_label_values(&["decode"]).inc();
        metrics.lookups_total.with_label_values(&["cache"]).inc();
        metrics
            .lookup_duration
            .with_label_values(&["db"])
            .observe(0.002);
        metrics.cache_entries.set(3);

        assert!(!metrics.registry().gather().is_empty());
    }
}
