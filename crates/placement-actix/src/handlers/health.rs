use actix_web::{web, HttpResponse};

use placement_core::PlacementError;
use placement_observability::Metrics;
use placement_ports::{DynStorage, Storage};

/// Prometheus text exposition of the process registry.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses((status = 200, description = "Prometheus text exposition"))
))]
pub async fn system_metrics(metrics: web::Data<Metrics>) -> Result<HttpResponse, PlacementError> {
    let text = placement_observability::render_metrics(&metrics.registry)
        .map_err(PlacementError::internal)?;

    Ok(HttpResponse::Ok()
        .content_type(placement_observability::PROMETHEUS_CONTENT_TYPE)
        .body(text))
}

/// Liveness: the process is up and serving.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health",
    tag = "Observability",
    responses((status = 200, description = "Process is serving"))
))]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "placement_server",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Readiness: the store answers a ping.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/ready",
    tag = "Observability",
    responses(
        (status = 200, description = "Store answers a ping"),
        (status = 503, description = "Store unreachable", body = PlacementError)
    )
))]
pub async fn readiness(db: web::Data<DynStorage>) -> Result<HttpResponse, PlacementError> {
    db.healthcheck().await.map_err(|e| {
        tracing::warn!(error = %e, "readiness check failed");
        PlacementError::unavailable("database unavailable")
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ready",
        "checks": {
            "database": "ok"
        }
    })))
}
