use actix_web::{web, HttpResponse, Responder};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::sync::Arc;

use crate::lookup::{LookupError, LookupService};
use crate::metrics::Metrics;

// ============================================================================
// HTTP API - thin transport over the lookup service
// ============================================================================
//
// GET /order/{order_uid}   point lookup; ?nocache bypasses the cache
// GET /metrics             Prometheus scrape endpoint
// GET /health              liveness probe
//
// X-Source and X-Duration-ms annotate which tier answered and how long it
// took. Observability metadata only, not part of the data contract.
// ============================================================================

pub struct AppState {
    pub lookup: LookupService,
    pub metrics: Arc<Metrics>,
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/order/{order_uid}", web::get().to(get_order))
        .route("/metrics", web::get().to(metrics_handler))
        .route("/health", web::get().to(health_handler));
}

#[derive(Deserialize)]
struct LookupQuery {
    nocache: Option<String>,
}

async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<LookupQuery>,
) -> HttpResponse {
    let order_uid = path.into_inner();
    let bypass = query.nocache.is_some();

    match state.lookup.get(&order_uid, bypass).await {
        Ok(lookup) => {
            let duration_ms = lookup.elapsed.as_secs_f64() * 1_000.0;
            tracing::info!(
                order_uid = %order_uid,
                source = lookup.source.as_str(),
                duration_ms = duration_ms,
                "Lookup request served"
            );
            HttpResponse::Ok()
                .insert_header(("X-Source", lookup.source.as_str()))
                .insert_header(("X-Duration-ms", format!("{duration_ms:.6}")))
                .json(lookup.order)
        }
        Err(LookupError::NotFound) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "order not found"
        })),
        Err(LookupError::Store(e)) => {
            tracing::error!(order_uid = %order_uid, error = %e, "Lookup failed");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal error"
            }))
        }
    }
}

async fn metrics_handler(state: web::Data<AppState>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry().gather();

    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

async fn health_handler() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "order-lookup"
    }))
}

// ============================================================================
// Unit Tests
// ============================================================================
