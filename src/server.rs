//! HTTP Server
//!
//! Implements the Prometheus exporter HTTP server. Collection is pull-driven: every
//! request to the metrics path runs one poll against the vCenter and renders it.
//!
//! # Endpoints
//!
//! - `GET /` - HTML landing page with links to metrics and health
//! - `GET {metrics_path}` - Prometheus metrics in text format (default `/metrics`)
//! - `GET /health` - 200 if the last poll saw the vCenter available, 503 otherwise
//!
//! # Error Handling
//!
//! A poll never turns into an HTTP error: partial or total vCenter failures are
//! reported through `vsphere_vcenter_available`. Only a rendering failure yields 500.

use crate::collectors::{Availability, Collector, CollectorSettings};
use crate::config::Config;
use crate::exposition;
use crate::metrics::MetricRegistry;
use crate::vsphere::VsphereClient;
use anyhow::Context;
use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
struct AppState {
    collector: Arc<Collector>,
    metrics_path: String,
    available: Arc<AtomicBool>,
}

pub async fn start(config: Config) -> anyhow::Result<()> {
    let client = Arc::new(VsphereClient::new(config.vsphere.clone())?);
    client
        .connect()
        .await
        .context("Unable to connect to the vCenter")?;
    info!("Connected to vCenter {}", config.vsphere.host);

    let registry = MetricRegistry::new(config.metrics.strategy);
    let collector = Collector::new(
        client.clone(),
        registry,
        CollectorSettings::from(&config.metrics),
    );
    info!("Collecting with the {} strategy", config.metrics.strategy);

    let app = router(Arc::new(collector), &config.server.metrics_path);

    let addr = format!("{}:{}", config.server.addr, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Metrics server listening on {}", addr);
    info!(
        "Metrics available at http://{}{}",
        addr, config.server.metrics_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    client.logout().await;
    Ok(())
}

/// Build the exporter's routes around a collector
pub fn router(collector: Arc<Collector>, metrics_path: &str) -> Router {
    let state = AppState {
        collector,
        metrics_path: metrics_path.to_string(),
        available: Arc::new(AtomicBool::new(false)),
    };

    Router::new()
        .route("/", get(root_handler))
        .route(metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    Html(format!(
        r#"<html>
<head><title>vSphere Exporter</title></head>
<body>
<h1>vSphere Exporter</h1>
<p><a href="{}">Metrics</a></p>
<p><a href="/health">Health</a></p>
</body>
</html>"#,
        state.metrics_path
    ))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let report = state.collector.collect().await;
    state.available.store(
        report.availability == Availability::Available,
        Ordering::Relaxed,
    );

    match exposition::render(&report) {
        Ok(metrics) => metrics.into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error rendering metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.available.load(Ordering::Relaxed) {
        (axum::http::StatusCode::OK, "OK")
    } else {
        (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "vCenter unavailable during the last poll",
        )
    }
}
