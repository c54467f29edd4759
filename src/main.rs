use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use catalog_pipeline::app_state::AppState;
use catalog_pipeline::config::AppConfig;
use catalog_pipeline::routes;
use catalog_pipeline::services::storage::{FileStore, R2Store};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing catalog-pipeline server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!("compute_jobs_submitted_total", "Jobs submitted to the compute endpoint");
    metrics::describe_counter!("compute_jobs_completed_total", "Compute jobs that completed");
    metrics::describe_counter!("compute_jobs_failed_total", "Compute jobs that failed or were rejected");
    metrics::describe_counter!("compute_jobs_timed_out_total", "Compute jobs abandoned at the deadline");
    metrics::describe_histogram!(
        "compute_job_duration_seconds",
        "Wall time from submission to a terminal compute state"
    );
    metrics::describe_counter!("batch_items_failed_total", "Garments that failed inside a batch");
    metrics::describe_counter!("catalogs_rendered_total", "Catalog documents written");

    if let Err(e) = config.require_compute() {
        tracing::warn!(error = %e, "Compute endpoint not configured; /generate jobs will fail");
    }

    // Storage is optional for the API; only /drive/upload needs it.
    let storage: Option<Arc<dyn FileStore>> = match config.storage() {
        Ok(settings) => {
            tracing::info!("Initializing R2 storage client");
            let store = R2Store::from_settings(&settings).expect("Failed to initialize R2 client");
            Some(Arc::new(store))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Storage not configured; uploads disabled");
            None
        }
    };

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, storage);

    let app = routes::router(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024)); // 10 MB limit

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
