//! HTTP API: health checks and the Prometheus scrape endpoint
//!
//! Every request to the metrics path runs one full collection across the
//! configured zones. Dropping the request (client gone, scrape timeout)
//! drops the collection with it.

use anyhow::Context;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use exporter_lib::{
    health::{ComponentStatus, HealthRegistry},
    metrics::encode_text,
    observability::ExporterMetrics,
    scrape::CollectorSet,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: ExporterMetrics,
    pub collectors: CollectorSet,
    pub metrics_path: String,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: ExporterMetrics,
        collectors: CollectorSet,
        metrics_path: impl Into<String>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            collectors,
            metrics_path: metrics_path.into(),
        }
    }
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Partial output is still served
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let outcome = state.collectors.scrape().await;

    for report in &outcome.reports {
        state
            .metrics
            .observe_collector_duration(report.collector, report.duration.as_secs_f64());
        state
            .health_registry
            .record_collection(report.collector, report.failures)
            .await;
    }
    state
        .health_registry
        .record_upstream(outcome.upstream_faults())
        .await;

    match encode_text(&outcome.samples, prometheus::gather()) {
        Ok(buffer) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            buffer,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn landing(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>SAKURA Cloud Exporter</title></head>\n<body>\n\
         <h1>SAKURA Cloud Exporter</h1>\n<p><a href=\"{path}\">Metrics</a></p>\n\
         </body>\n</html>\n",
        path = state.metrics_path
    ))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let metrics_path = state.metrics_path.clone();
    Router::new()
        .route("/", get(landing))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(&metrics_path, get(metrics))
        .with_state(state)
}

/// Start the API server, returning once `shutdown` resolves
pub async fn serve<F>(addr: &str, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
