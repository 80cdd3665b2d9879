/// Health and metrics endpoints
use crate::{context::AppContext, metrics, store::ClientPathManager};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/health/ready", get(readiness_probe))
        .route("/metrics", get(metrics_handler))
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: f64,
}

/// Basic health check
pub async fn health_basic(State(ctx): State<AppContext>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: ctx.started_at.elapsed().as_secs_f64(),
    })
}

/// Readiness probe - the key store must answer a read
pub async fn readiness_probe(
    State(ctx): State<AppContext>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let probe = ClientPathManager::new("C.readiness").key();
    if let Err(e) = ctx.key_store.get(&probe).await {
        tracing::warn!(error = %e, "readiness probe failed: key store unavailable");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(serde_json::json!({
        "status": "ready",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

/// Prometheus metrics endpoint
pub async fn metrics_handler(State(ctx): State<AppContext>) -> String {
    metrics::UPTIME_SECONDS.set(ctx.started_at.elapsed().as_secs_f64());
    metrics::render_metrics()
}
