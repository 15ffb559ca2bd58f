//! HTTP surface: the Kubernetes custom and external metrics API paths plus
//! the adapter's own health and Prometheus endpoints.

pub mod custom;
pub mod external;

use std::sync::Arc;

use axum::{
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{metrics, provider::MetricsProvider, AdapterError, Result};

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<MetricsProvider>,
}

pub fn build_router(provider: Arc<MetricsProvider>) -> Router {
    let state = AppState { provider };

    Router::new()
        .route("/apis/custom.metrics.k8s.io/v1beta2", get(custom::list_metrics))
        .route(
            "/apis/custom.metrics.k8s.io/v1beta2/namespaces/:namespace/pods/:name/:metric",
            get(custom::get_pod_metric),
        )
        .route("/apis/external.metrics.k8s.io/v1beta1", get(external::list_metrics))
        .route(
            "/apis/external.metrics.k8s.io/v1beta1/namespaces/:namespace/:metric",
            get(external::get_metric),
        )
        .route("/metrics", get(prometheus_metrics))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn prometheus_metrics() -> Result<impl IntoResponse> {
    let body = metrics::render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

/// Serves `router` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .map_err(|e| AdapterError::Internal(format!("Failed to read local address: {}", e)))?;
    info!(%addr, "metrics API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AdapterError::Internal(format!("Server error: {}", e)))
}
