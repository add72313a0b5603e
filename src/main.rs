use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod cache;
mod config;
mod consumer;
mod lookup;
mod metrics;
mod models;
mod store;
mod warmup;

use cache::OrderCache;
use config::Config;
use consumer::OrderConsumer;
use lookup::LookupService;
use metrics::Metrics;
use store::{OrderStore, PgOrderStore};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging with environment-based filtering.
    // Override with e.g. RUST_LOG=debug.
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_lookup=debug")),
        )
        .init();

    let cfg = Config::from_env()?;
    tracing::info!("Starting order lookup service");

    // === Persistent store ===
    tracing::info!("Connecting to Postgres");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;
    let pg_store = PgOrderStore::new(pool);
    pg_store.migrate().await?;
    let store: Arc<dyn OrderStore> = Arc::new(pg_store);

    let cache = Arc::new(OrderCache::new());
    let metrics = Arc::new(Metrics::new()?);

    // === Warmup, before any traffic is considered ready ===
    let warmed = warmup::warm_cache(store.as_ref(), &cache, cfg.warm_n).await;
    metrics.cache_entries.set(warmed as i64);

    // === Kafka consumer ===
    let shutdown = CancellationToken::new();
    let consumer = OrderConsumer::new(
        &cfg.kafka_brokers,
        &cfg.kafka_group_id,
        &cfg.kafka_topic,
        store.clone(),
        cache.clone(),
        metrics.clone(),
    )?;
    let consumer_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { consumer.run(shutdown).await }
    });

    // === HTTP server ===
    let state = web::Data::new(api::AppState {
        lookup: LookupService::new(
            store.clone(),
            cache.clone(),
            cfg.cache_enabled,
            metrics.clone(),
        ),
        metrics: metrics.clone(),
    });
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::routes)
    })
    .bind(&cfg.http_addr)?
    .run();
    let server_handle = server.handle();
    tracing::info!(addr = %cfg.http_addr, "HTTP server listening");
    let server_task = tokio::spawn(server);

    // === Shutdown: stop claiming, drain in-flight within the grace window ===
    wait_for_shutdown_signal().await?;
    tracing::info!("Shutdown requested");

    shutdown.cancel();
    if tokio::time::timeout(cfg.shutdown_grace, server_handle.stop(true))
        .await
        .is_err()
    {
        tracing::warn!("Graceful stop exceeded grace period, forcing shutdown");
        server_handle.stop(false).await;
    }

    consumer_task.await?;
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    let mut sigterm =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = sigterm.recv() => {}
    }
    Ok(())
}
